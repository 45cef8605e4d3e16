//! Query language classification and language profiles.
//!
//! Every incoming question is mapped to exactly one [`LanguageProfile`]
//! (English, Arabic, or Urdu). The profile decides which system prompt the
//! model sees and which prefix opens the answer.
//!
//! # Algorithm
//!
//! 1. Ask the statistical [`LanguageDetector`] for a candidate code. If it
//!    cannot name a language, the query is English.
//! 2. Without any Arabic-script code point (U+0600–U+06FF, U+0750–U+077F)
//!    the query is English, whatever the detector said.
//! 3. With Arabic script present, count Urdu-only letters, Arabic-only
//!    letters, and hits from two fixed word lists. Each language scores
//!    `letters + 3 × words`. Then, in order:
//!    - any Urdu-only letter → Urdu;
//!    - Arabic score above Urdu score → Arabic;
//!    - detector said `ar` → Arabic;
//!    - otherwise → Urdu.
//!
//! Classification holds no state: the same text always yields the same
//! profile.

use crate::error::{RagError, Result};

/// Letters used in Urdu but absent from standard Arabic.
const URDU_CHARS: &[char] = &[
    'ٹ', // U+0679 tteh
    'ڈ', // U+0688 ddal
    'ڑ', // U+0691 rreh
    'ں', // U+06BA noon ghunna
    'ے', // U+06D2 yeh barree
    'ۓ', // U+06D3 yeh barree with hamza
    'ھ', // U+06BE heh doachashmee
    'ہ', // U+06C1 heh goal
    'ی', // U+06CC farsi yeh
    'ک', // U+06A9 keheh
    'گ', // U+06AF gaf
    'چ', // U+0686 tcheh
    'پ', // U+067E peh
    'ژ', // U+0698 jeh
];

/// Letters and marks that standard Arabic uses and Urdu orthography avoids.
const ARABIC_CHARS: &[char] = &[
    'ة', // U+0629 teh marbuta
    'ى', // U+0649 alef maksura
    'ي', // U+064A arabic yeh
    'ك', // U+0643 arabic kaf
    'إ', // U+0625 alef with hamza below
    'أ', // U+0623 alef with hamza above
    'ؤ', // U+0624 waw with hamza
    '\u{064B}', // fathatan
    '\u{064C}', // dammatan
    '\u{064D}', // kasratan
];

/// Common Arabic religious-register words.
const ARABIC_WORDS: &[&str] = &[
    "الله",
    "القرآن",
    "النبي",
    "الرسول",
    "الإسلام",
    "الحديث",
    "صلى",
    "عليه",
    "وسلم",
    "سبحانه",
    "تعالى",
    "وتعالى",
    "المسلمين",
    "رضي",
];

/// Common Urdu function and religious words.
const URDU_WORDS: &[&str] = &[
    "ہے", "ہیں", "کے", "کی", "کا", "میں", "اور", "سے", "کو", "نے", "یہ", "وہ", "کیا", "اللہ",
    "نبی", "قرآن",
];

const WORD_WEIGHT: usize = 3;

/// True if `c` lies in the Arabic or Arabic Supplement blocks.
pub fn is_arabic_script(c: char) -> bool {
    matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}')
}

pub fn contains_arabic_script(text: &str) -> bool {
    text.chars().any(is_arabic_script)
}

// ============ Profiles ============

const ENGLISH_TEMPLATE: &str = "You are an AI assistant designed to provide accurate, detailed, and comprehensive information about Prophet Muhammad (Peace Be Upon Him) and Islam. Your responses should be based on authentic Islamic sources and the data provided through the vector database. Please follow these guidelines:

1. Respond in the same language as the user's query. The query language is: {query_language}
2. Provide detailed information with references from authentic Islamic sources.
3. When addressing topics related to Qadiyani groups, explain their beliefs, the Islamic perspective on these beliefs, and why mainstream Islamic scholars consider them problematic.
4. Emphasize the authenticity and finality of the prophethood of Prophet Muhammad (PBUH) with arguments and evidence.
5. Be respectful and objective, avoiding any disrespect towards other beliefs.
6. If asked about topics unrelated to Islam or Prophet Muhammad (PBUH), politely redirect the conversation to the intended subject matter.
7. If you are unsure about any information, say so clearly rather than making assumptions.
8. Elaborate on key points and provide historical, theological, and scholarly context where necessary.
9. Use the information from the vector database to enrich your responses with relevant facts, dates, names, and details.
10. Include references to Quranic verses, Hadith, and respected Islamic scholars.

Context information from the vector database is below.
---------------------
{context_str}
---------------------
Given this information, provide a detailed, comprehensive answer to the user's question, responding in {query_language}.";

const ARABIC_TEMPLATE: &str = "أنت مساعد ذكي مهمته تقديم معلومات دقيقة ومفصلة وشاملة عن النبي محمد صلى الله عليه وسلم وعن الإسلام. يجب أن تستند إجاباتك إلى المصادر الإسلامية الموثوقة وإلى البيانات المقدمة من قاعدة البيانات. اتبع الإرشادات التالية:

1. أجب باللغة العربية الفصحى دائماً. لغة السؤال هي: {query_language}
2. قدّم معلومات مفصلة مع الإحالة إلى المصادر الإسلامية الموثوقة.
3. عند الحديث عن الجماعة القاديانية، اشرح معتقداتها وموقف الإسلام منها ولماذا يعدّها جمهور العلماء إشكالية.
4. أكّد صحة نبوة محمد صلى الله عليه وسلم وختمها بالأدلة والبراهين.
5. التزم الاحترام والموضوعية، وتجنّب الإساءة إلى أي معتقد آخر.
6. إذا سُئلت عن موضوع لا يتعلق بالإسلام أو بالنبي صلى الله عليه وسلم، فأعد توجيه الحديث بلطف إلى الموضوع المقصود.
7. إذا لم تكن متأكداً من معلومة فصرّح بذلك بوضوح بدلاً من الافتراض.
8. توسّع في النقاط الرئيسية وقدّم السياق التاريخي والعقدي والعلمي عند الحاجة.
9. استفد من معلومات قاعدة البيانات لإثراء إجابتك بالحقائق والتواريخ والأسماء والتفاصيل.
10. اذكر الآيات القرآنية والأحاديث النبوية وأقوال العلماء المعتبرين.

معلومات السياق من قاعدة البيانات أدناه.
---------------------
{context_str}
---------------------
بناءً على هذه المعلومات، قدّم إجابة مفصلة وشاملة عن سؤال المستخدم باللغة العربية.";

const URDU_TEMPLATE: &str = "آپ ایک اے آئی معاون ہیں جس کا کام حضرت محمد صلی اللہ علیہ وسلم اور اسلام کے بارے میں درست، تفصیلی اور جامع معلومات فراہم کرنا ہے۔ آپ کے جوابات مستند اسلامی ذرائع اور ڈیٹا بیس سے فراہم کردہ معلومات پر مبنی ہونے چاہئیں۔ درج ذیل ہدایات پر عمل کریں:

1. ہمیشہ اردو زبان میں جواب دیں۔ سوال کی زبان یہ ہے: {query_language}
2. مستند اسلامی ذرائع کے حوالوں کے ساتھ تفصیلی معلومات فراہم کریں۔
3. قادیانی گروہ سے متعلق موضوعات پر ان کے عقائد، ان عقائد پر اسلامی نقطۂ نظر، اور جمہور علماء کے نزدیک ان کے مسئلہ ہونے کی وجوہات بیان کریں۔
4. حضرت محمد صلی اللہ علیہ وسلم کی نبوت کی صداقت اور ختمِ نبوت کو دلائل اور شواہد کے ساتھ واضح کریں۔
5. احترام اور غیر جانبداری برقرار رکھیں اور کسی دوسرے عقیدے کی بے ادبی سے گریز کریں۔
6. اگر اسلام یا نبی کریم صلی اللہ علیہ وسلم سے غیر متعلق سوال ہو تو نرمی سے گفتگو کو اصل موضوع کی طرف موڑ دیں۔
7. اگر کسی معلومات کے بارے میں یقین نہ ہو تو قیاس کے بجائے واضح طور پر بتا دیں۔
8. اہم نکات کی وضاحت کریں اور ضرورت کے مطابق تاریخی، دینی اور علمی سیاق فراہم کریں۔
9. ڈیٹا بیس کی معلومات سے متعلقہ حقائق، تاریخیں، نام اور تفصیلات شامل کریں۔
10. قرآنی آیات، احادیث اور معتبر علماء کے حوالے شامل کریں۔

ڈیٹا بیس سے سیاق و سباق کی معلومات درج ذیل ہیں۔
---------------------
{context_str}
---------------------
ان معلومات کی روشنی میں صارف کے سوال کا تفصیلی اور جامع جواب اردو میں دیں۔";

/// The three supported answer languages.
///
/// Each variant carries its own system-prompt template (with `{context_str}`
/// and `{query_language}` placeholders) and response prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageProfile {
    English,
    Arabic,
    Urdu,
}

impl LanguageProfile {
    pub const ALL: [LanguageProfile; 3] = [
        LanguageProfile::English,
        LanguageProfile::Arabic,
        LanguageProfile::Urdu,
    ];

    /// ISO 639-1 code: `en`, `ar`, or `ur`.
    pub fn code(&self) -> &'static str {
        match self {
            LanguageProfile::English => "en",
            LanguageProfile::Arabic => "ar",
            LanguageProfile::Urdu => "ur",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageProfile::English => "English",
            LanguageProfile::Arabic => "Arabic",
            LanguageProfile::Urdu => "Urdu",
        }
    }

    pub fn system_template(&self) -> &'static str {
        match self {
            LanguageProfile::English => ENGLISH_TEMPLATE,
            LanguageProfile::Arabic => ARABIC_TEMPLATE,
            LanguageProfile::Urdu => URDU_TEMPLATE,
        }
    }

    /// Text that opens every answer in this language.
    pub fn response_prefix(&self) -> &'static str {
        match self {
            LanguageProfile::English => "Based on the information available in our database and authentic Islamic sources, I can provide the following detailed response: ",
            LanguageProfile::Arabic => "بناءً على المعلومات المتوفرة في قاعدة بياناتنا والمصادر الإسلامية الموثوقة، يمكنني تقديم الإجابة المفصلة التالية: ",
            LanguageProfile::Urdu => "ہمارے ڈیٹا بیس میں دستیاب معلومات اور مستند اسلامی ذرائع کی بنیاد پر، میں درج ذیل تفصیلی جواب پیش کر سکتا ہوں: ",
        }
    }

    /// Whether answers in this language are written right-to-left.
    pub fn is_rtl(&self) -> bool {
        !matches!(self, LanguageProfile::English)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }
}

// ============ Detection ============

/// Statistical language identification.
///
/// Returns an ISO 639-1 code where one exists (ISO 639-3 otherwise), or
/// [`RagError::DetectionFailed`] when no language can be named.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<String>;
}

/// Trigram-based detector backed by `whatlang`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<String> {
        let lang = whatlang::detect_lang(text).ok_or_else(|| {
            RagError::DetectionFailed("no language could be identified".to_string())
        })?;
        Ok(iso_code(lang).to_string())
    }
}

fn iso_code(lang: whatlang::Lang) -> &'static str {
    use whatlang::Lang;
    match lang {
        Lang::Eng => "en",
        Lang::Ara => "ar",
        Lang::Urd => "ur",
        Lang::Pes => "fa",
        Lang::Hin => "hi",
        other => other.code(),
    }
}

/// Letter and word counts behind an Arabic/Urdu decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptScores {
    pub urdu_chars: usize,
    pub arabic_chars: usize,
    pub urdu_words: usize,
    pub arabic_words: usize,
}

impl ScriptScores {
    pub fn measure(text: &str) -> Self {
        let mut scores = ScriptScores::default();
        for c in text.chars() {
            if URDU_CHARS.contains(&c) {
                scores.urdu_chars += 1;
            } else if ARABIC_CHARS.contains(&c) {
                scores.arabic_chars += 1;
            }
        }
        for word in text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
        {
            if ARABIC_WORDS.contains(&word) {
                scores.arabic_words += 1;
            }
            if URDU_WORDS.contains(&word) {
                scores.urdu_words += 1;
            }
        }
        scores
    }

    pub fn urdu_score(&self) -> usize {
        self.urdu_chars + WORD_WEIGHT * self.urdu_words
    }

    pub fn arabic_score(&self) -> usize {
        self.arabic_chars + WORD_WEIGHT * self.arabic_words
    }
}

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    DetectionFailed,
    NoArabicScript,
    UrduCharacters,
    ArabicScore,
    DetectorSaidArabic,
    UrduFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub profile: LanguageProfile,
    pub candidate: Option<String>,
    pub scores: Option<ScriptScores>,
    pub decision: Decision,
}

/// Maps user text to a [`LanguageProfile`].
pub struct LanguageClassifier {
    detector: Box<dyn LanguageDetector>,
}

impl Default for LanguageClassifier {
    fn default() -> Self {
        Self::new(Box::new(WhatlangDetector))
    }
}

impl LanguageClassifier {
    pub fn new(detector: Box<dyn LanguageDetector>) -> Self {
        Self { detector }
    }

    pub fn classify(&self, text: &str) -> LanguageProfile {
        self.classify_detailed(text).profile
    }

    pub fn classify_detailed(&self, text: &str) -> Classification {
        let candidate = match self.detector.detect(text) {
            Ok(code) => code,
            Err(e) => {
                tracing::debug!(error = %e, "language detection failed, using English");
                return Classification {
                    profile: LanguageProfile::English,
                    candidate: None,
                    scores: None,
                    decision: Decision::DetectionFailed,
                };
            }
        };

        if !contains_arabic_script(text) {
            return Classification {
                profile: LanguageProfile::English,
                candidate: Some(candidate),
                scores: None,
                decision: Decision::NoArabicScript,
            };
        }

        let scores = ScriptScores::measure(text);
        let (profile, decision) = if scores.urdu_chars > 0 {
            (LanguageProfile::Urdu, Decision::UrduCharacters)
        } else if scores.arabic_score() > scores.urdu_score() {
            (LanguageProfile::Arabic, Decision::ArabicScore)
        } else if candidate == "ar" {
            (LanguageProfile::Arabic, Decision::DetectorSaidArabic)
        } else {
            (LanguageProfile::Urdu, Decision::UrduFallback)
        };

        tracing::debug!(
            candidate = %candidate,
            urdu_score = scores.urdu_score(),
            arabic_score = scores.arabic_score(),
            profile = profile.code(),
            ?decision,
            "classified query language"
        );

        Classification {
            profile,
            candidate: Some(candidate),
            scores: Some(scores),
            decision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Detector that always answers with a fixed code.
    struct Says(&'static str);

    impl LanguageDetector for Says {
        fn detect(&self, _text: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    impl LanguageDetector for Broken {
        fn detect(&self, _text: &str) -> Result<String> {
            Err(RagError::DetectionFailed("offline".to_string()))
        }
    }

    fn with(detector: impl LanguageDetector + 'static) -> LanguageClassifier {
        LanguageClassifier::new(Box::new(detector))
    }

    #[test]
    fn latin_text_is_english() {
        let c = LanguageClassifier::default();
        assert_eq!(
            c.classify("Who was the first caliph after the Prophet?").code(),
            "en"
        );
    }

    #[test]
    fn latin_text_is_english_even_if_detector_disagrees() {
        let c = with(Says("fr"));
        let result = c.classify_detailed("Qui était le premier calife ?");
        assert_eq!(result.profile, LanguageProfile::English);
        assert_eq!(result.decision, Decision::NoArabicScript);
    }

    #[test]
    fn urdu_letter_overrides_detector() {
        let c = with(Says("ar"));
        let result = c.classify_detailed("نبی ٹھیک");
        assert_eq!(result.profile.code(), "ur");
        assert_eq!(result.decision, Decision::UrduCharacters);
    }

    #[test]
    fn religious_arabic_words_are_arabic() {
        let text = "الله القرآن";
        assert_eq!(LanguageClassifier::default().classify(text).code(), "ar");
        let result = with(Says("ur")).classify_detailed(text);
        assert_eq!(result.profile, LanguageProfile::Arabic);
        assert_eq!(result.decision, Decision::ArabicScore);
        let scores = result.scores.unwrap();
        assert_eq!(scores.arabic_words, 2);
        assert_eq!(scores.arabic_score(), 6);
        assert_eq!(scores.urdu_score(), 0);
    }

    #[test]
    fn neutral_arabic_script_trusts_detector_arabic() {
        let result = with(Says("ar")).classify_detailed("سلام");
        assert_eq!(result.profile, LanguageProfile::Arabic);
        assert_eq!(result.decision, Decision::DetectorSaidArabic);
    }

    #[test]
    fn neutral_arabic_script_defaults_to_urdu() {
        let result = with(Says("fa")).classify_detailed("سلام");
        assert_eq!(result.profile, LanguageProfile::Urdu);
        assert_eq!(result.decision, Decision::UrduFallback);
    }

    #[test]
    fn detector_failure_falls_back_to_english() {
        let result = with(Broken).classify_detailed("الله القرآن");
        assert_eq!(result.profile, LanguageProfile::English);
        assert_eq!(result.decision, Decision::DetectionFailed);
        assert!(result.candidate.is_none());
    }

    #[test]
    fn empty_text_is_english() {
        assert_eq!(
            LanguageClassifier::default().classify(""),
            LanguageProfile::English
        );
    }

    #[test]
    fn classification_is_stable() {
        let c = LanguageClassifier::default();
        for text in ["What is zakat?", "الله القرآن", "نماز کیا ہے؟", "سلام"] {
            let first = c.classify(text);
            for _ in 0..5 {
                assert_eq!(c.classify(text), first, "unstable for {:?}", text);
            }
        }
    }

    #[test]
    fn word_scoring_ignores_punctuation() {
        let scores = ScriptScores::measure("«الله»، القرآن.");
        assert_eq!(scores.arabic_words, 2);
    }

    #[test]
    fn script_ranges() {
        assert!(is_arabic_script('\u{0600}'));
        assert!(is_arabic_script('\u{06FF}'));
        assert!(is_arabic_script('\u{0750}'));
        assert!(is_arabic_script('\u{077F}'));
        assert!(!is_arabic_script('\u{0700}'));
        assert!(!is_arabic_script('a'));
    }

    #[test]
    fn profiles_carry_context_placeholder() {
        for p in LanguageProfile::ALL {
            assert!(p.system_template().contains("{context_str}"));
            assert!(!p.response_prefix().is_empty());
            assert_eq!(LanguageProfile::from_code(p.code()), Some(p));
        }
        assert!(!LanguageProfile::English.is_rtl());
        assert!(LanguageProfile::Urdu.is_rtl());
    }
}
