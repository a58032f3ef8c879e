//! Statistical reading analytics.
//!
//! Pure functions over a document's segments: no generation, no I/O. Each
//! metric reads only a bounded prefix of the document (see
//! [`AnalyticsConfig`]), except the sentiment arc, which covers every
//! segment so the trend spans the whole book.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::config::{AnalyticsConfig, ReadabilityBands};
use crate::models::Segment;

const STOPWORDS: [&str; 13] = [
    "the", "and", "a", "to", "of", "in", "is", "it", "that", "with", "for", "as", "on",
];

const VOWELS: &str = "aeiouy";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readability {
    /// Mean reading-ease score, one decimal place. Higher is easier.
    pub score: f64,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentPoint {
    /// 1-based segment number.
    pub segment: usize,
    /// Polarity in `[-1, 1]`.
    pub polarity: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordCount {
    pub term: String,
    pub count: usize,
}

/// Everything shown on the Deep Insights view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub readability: Option<Readability>,
    pub sentiment_arc: Vec<SentimentPoint>,
    pub keywords: Vec<KeywordCount>,
}

pub fn insights(segments: &[Segment], config: &AnalyticsConfig) -> Insights {
    Insights {
        readability: reading_complexity(segments, config),
        sentiment_arc: sentiment_arc(segments),
        keywords: keyword_frequency(segments, config),
    }
}

/// Flesch-style reading ease over the first `readability_sample` segments.
///
/// Syllables are approximated by counting vowel letters. `None` when there
/// are no segments.
pub fn reading_complexity(segments: &[Segment], config: &AnalyticsConfig) -> Option<Readability> {
    let sample = &segments[..segments.len().min(config.readability_sample)];
    if sample.is_empty() {
        return None;
    }

    let total: f64 = sample.iter().map(|s| reading_ease(&s.text)).sum();
    let mean = total / sample.len() as f64;
    let score = (mean * 10.0).round() / 10.0;
    Some(Readability {
        score,
        level: readability_label(score, &config.bands).to_string(),
    })
}

/// Reading-ease score of a single text.
pub fn reading_ease(text: &str) -> f64 {
    let words = words(text).len().max(1) as f64;
    let sentences = sentence_count(text).max(1) as f64;
    let vowels = text
        .chars()
        .filter(|c| VOWELS.contains(c.to_ascii_lowercase()))
        .count() as f64;

    206.835 - 1.015 * (words / sentences) - 84.6 * (vowels / words)
}

pub fn readability_label(score: f64, bands: &ReadabilityBands) -> &'static str {
    if score > bands.very_easy {
        "Very Easy (5th Grade)"
    } else if score > bands.standard {
        "Standard (8th-9th Grade)"
    } else if score > bands.college {
        "College Level"
    } else {
        "Professional / Academic"
    }
}

/// Polarity of every segment, in document order.
pub fn sentiment_arc(segments: &[Segment]) -> Vec<SentimentPoint> {
    segments
        .iter()
        .enumerate()
        .map(|(i, s)| SentimentPoint {
            segment: i + 1,
            polarity: polarity(&s.text),
        })
        .collect()
}

/// Lexicon polarity of `text`: the mean score of its opinion words.
///
/// A negator within the two preceding words flips and dampens a score
/// (`x -0.5`); an intensifier directly before it scales it. Texts without
/// opinion words are neutral.
pub fn polarity(text: &str) -> f64 {
    let tokens = words(text);
    let mut total = 0.0;
    let mut hits = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        let Some(base) = lexicon_score(token) else {
            continue;
        };
        let mut score = base;

        if i > 0 {
            if let Some(factor) = intensifier(&tokens[i - 1]) {
                score *= factor;
            }
        }
        let window = &tokens[i.saturating_sub(2)..i];
        if window.iter().any(|w| is_negator(w)) {
            score *= -0.5;
        }

        total += score.clamp(-1.0, 1.0);
        hits += 1;
    }

    if hits == 0 {
        return 0.0;
    }
    (total / hits as f64).clamp(-1.0, 1.0)
}

/// The `keyword_limit` most frequent long words in the first
/// `keyword_sample` segments.
///
/// Words of four characters or fewer and stop-words are ignored. Ties keep
/// first-appearance order.
pub fn keyword_frequency(segments: &[Segment], config: &AnalyticsConfig) -> Vec<KeywordCount> {
    let sample = &segments[..segments.len().min(config.keyword_sample)];

    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut seen = 0usize;
    for segment in sample {
        for word in words(&segment.text) {
            if word.chars().count() <= 4 || STOPWORDS.contains(&word.as_str()) {
                continue;
            }
            let entry = counts.entry(word).or_insert_with(|| {
                seen += 1;
                (0, seen)
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.truncate(config.keyword_limit);

    ranked
        .into_iter()
        .map(|(term, count, _)| KeywordCount { term, count })
        .collect()
}

/// Lowercased word tokens. Apostrophes inside a word are kept, with
/// typographic quotes folded to `'`.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || is_apostrophe(c)))
        .map(|w| w.trim_matches(is_apostrophe))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'"))
        .collect()
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}' | '\u{2018}')
}

fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count()
}

/// Opinion words by score tier. Inflected forms are listed explicitly.
const LEXICON: &[(f64, &[&str])] = &[
    (
        0.9,
        &[
            "excellent", "wonderful", "amazing", "brilliant", "perfect", "superb",
            "outstanding", "delightful", "magnificent", "marvelous", "marvellous", "glorious",
            "splendid", "exquisite", "ecstatic", "blissful", "triumphant", "exhilarating",
            "fantastic", "extraordinary", "heavenly", "divine", "adore", "adored",
        ],
    ),
    (
        0.7,
        &[
            "love", "loved", "loving", "lovely", "joy", "joyful", "joyous", "happy",
            "happiness", "beautiful", "great", "triumph", "hope", "hopeful", "success",
            "successful", "delight", "delighted", "cheerful", "merry", "admire", "admired",
            "grateful", "thankful", "proud", "courage", "courageous", "brave", "victory",
            "victorious", "charming", "tender", "affection", "affectionate", "inspiring",
            "inspired", "thrilled", "excited", "exciting", "laugh", "laughed", "laughter",
            "smile", "smiled", "smiling", "celebrate", "celebrated", "blessed", "treasure",
            "precious", "gentle", "generous", "honest", "noble", "faithful", "loyal",
        ],
    ),
    (
        0.5,
        &[
            "good", "pleasant", "kind", "kindness", "nice", "calm", "glad", "win", "won",
            "peace", "peaceful", "bright", "warm", "friendly", "better", "best", "comfort",
            "comfortable", "content", "enjoy", "enjoyed", "enjoyable", "pleased", "relief",
            "relieved", "trust", "trusted", "helpful", "help", "helped", "agree", "agreed",
            "welcome", "welcomed", "sweet", "fresh", "healthy", "strong", "wise", "wisdom",
            "rich", "free", "freedom", "fortunate", "lucky", "promise", "promising", "respect",
            "respected", "care", "cared", "caring", "gain", "improve", "improved", "reward",
            "rewarding", "hero", "heroic", "sunny", "serene", "secure", "satisfied",
        ],
    ),
    (
        0.3,
        &[
            "fine", "fair", "interesting", "useful", "clear", "safe", "okay", "ok", "decent",
            "easy", "simple", "valuable", "worthy", "favorable", "favourable", "positive",
            "curious", "quiet", "soft", "patient", "able", "ready", "right", "true",
            "important", "effective", "efficient", "solid", "steady", "smooth", "clean",
        ],
    ),
    (
        -0.9,
        &[
            "terrible", "horrible", "awful", "disaster", "disastrous", "tragic", "tragedy",
            "catastrophe", "catastrophic", "hate", "hated", "hatred", "despair", "dreadful",
            "horror", "horrific", "atrocious", "miserable", "misery", "agony", "torment",
            "devastated", "devastating", "murder", "murdered", "evil", "wicked", "vile",
            "loathe", "loathed", "abhor", "disgusting", "hopeless", "nightmare",
        ],
    ),
    (
        -0.7,
        &[
            "bad", "sad", "sadness", "fear", "feared", "afraid", "angry", "anger", "rage",
            "furious", "death", "dead", "die", "died", "dying", "pain", "painful", "cruel",
            "cruelty", "failure", "failed", "fail", "loss", "war", "grief", "grieve",
            "sorrow", "sorrowful", "suffer", "suffered", "suffering", "hurt", "wound",
            "wounded", "betray", "betrayed", "betrayal", "violent", "violence", "kill",
            "killed", "cry", "cried", "weep", "wept", "tears", "fright", "frightened",
            "terrified", "terror", "shame", "ashamed", "guilt", "guilty", "destroy",
            "destroyed", "ruin", "ruined", "enemy", "hostile", "bitter", "jealous",
            "unhappy", "anxious", "anxiety", "panic", "desperate", "alone",
        ],
    ),
    (
        -0.4,
        &[
            "poor", "worse", "worst", "dark", "darkness", "cold", "lost", "wrong", "hard",
            "difficult", "lonely", "problem", "problems", "trouble", "troubled", "worry",
            "worried", "doubt", "doubtful", "danger", "dangerous", "sick", "ill", "ugly",
            "harsh", "tired", "weary", "gloomy", "grim", "nervous", "upset", "annoyed",
            "annoying", "confused", "confusing", "regret", "regretted", "struggle",
            "struggled", "conflict", "crisis", "threat", "threatened", "storm", "broken",
            "empty", "mistake", "mistakes", "blame", "blamed", "complain", "complained",
            "unfair", "difficulty", "disappointed", "disappointing", "negative",
        ],
    ),
    (
        -0.3,
        &[
            "boring", "dull", "odd", "weak", "strange", "awkward", "tedious", "slow",
            "messy", "uncertain", "vague", "careless", "lazy", "petty", "silly", "bland",
            "mediocre", "uneasy", "restless", "reluctant", "hesitant",
        ],
    ),
];

fn lexicon() -> &'static HashMap<&'static str, f64> {
    static TABLE: OnceLock<HashMap<&'static str, f64>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LEXICON
            .iter()
            .flat_map(|(score, terms)| terms.iter().map(move |t| (*t, *score)))
            .collect()
    })
}

fn lexicon_score(word: &str) -> Option<f64> {
    lexicon().get(word).copied()
}

fn intensifier(word: &str) -> Option<f64> {
    match word {
        "extremely" | "incredibly" | "utterly" => Some(1.5),
        "very" | "really" | "truly" | "deeply" => Some(1.3),
        "so" | "quite" | "too" => Some(1.2),
        "slightly" | "somewhat" | "barely" => Some(0.5),
        _ => None,
    }
}

fn is_negator(word: &str) -> bool {
    matches!(
        word,
        "not" | "no" | "never" | "nor" | "neither" | "nobody" | "nothing" | "none" | "cannot"
    ) || word.ends_with("n't")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(texts: &[&str]) -> Vec<Segment> {
        texts
            .iter()
            .map(|t| Segment {
                text: t.to_string(),
                page_number: Some(1),
                source_id: "book.pdf".to_string(),
                start_offset: 0,
            })
            .collect()
    }

    #[test]
    fn no_segments_has_no_readability() {
        assert!(reading_complexity(&[], &AnalyticsConfig::default()).is_none());
    }

    #[test]
    fn longer_sentences_and_more_vowels_score_lower() {
        let easy = reading_ease("The cat sat. The dog ran. It is hot. We sit.");
        let hard = reading_ease(
            "Organisational interdependencies associated with quantitative evaluation \
             methodologies invariably necessitate considerable reconsideration of \
             previously authoritative educational assumptions regarding population.",
        );
        assert!(hard < easy, "hard={} easy={}", hard, easy);
    }

    #[test]
    fn score_is_rounded_and_labelled() {
        let cfg = AnalyticsConfig::default();
        let r = reading_complexity(&segs(&["The cat sat. The dog ran."]), &cfg).unwrap();
        assert_eq!(r.score, (r.score * 10.0).round() / 10.0);
        assert_eq!(r.level, readability_label(r.score, &cfg.bands));
    }

    #[test]
    fn labels_follow_bands() {
        let bands = ReadabilityBands::default();
        assert_eq!(readability_label(95.0, &bands), "Very Easy (5th Grade)");
        assert_eq!(readability_label(90.0, &bands), "Standard (8th-9th Grade)");
        assert_eq!(readability_label(45.0, &bands), "College Level");
        assert_eq!(readability_label(30.0, &bands), "Professional / Academic");
        assert_eq!(readability_label(-12.0, &bands), "Professional / Academic");
    }

    #[test]
    fn readability_reads_only_the_sample() {
        let cfg = AnalyticsConfig {
            readability_sample: 1,
            ..AnalyticsConfig::default()
        };
        let first = "The cat sat.";
        let with_tail = reading_complexity(
            &segs(&[first, "Incomprehensibly labyrinthine administrative obfuscation"]),
            &cfg,
        );
        assert_eq!(with_tail, reading_complexity(&segs(&[first]), &cfg));
    }

    #[test]
    fn polarity_handles_negation_and_intensifiers() {
        assert!(polarity("It was a wonderful and happy day.") > 0.5);
        assert!(polarity("A terrible, tragic loss.") < -0.5);
        assert_eq!(polarity("The table has four legs."), 0.0);

        let plain = polarity("The ending was good.");
        let negated = polarity("The ending was not good.");
        assert!(negated < 0.0);
        assert!((negated - plain * -0.5).abs() < 1e-9);

        assert!(polarity("It was very good.") > plain);
        assert!(polarity("It wasn't bad.") > 0.0);
    }

    #[test]
    fn typographic_apostrophes_still_negate() {
        let straight = polarity("I don't feel happy.");
        let curly = polarity("I don\u{2019}t feel happy.");
        assert!(straight < 0.0);
        assert_eq!(curly, straight);
        assert_eq!(words("\u{2018}Tis the captain\u{2019}s"), vec!["tis", "the", "captain's"]);
    }

    #[test]
    fn ordinary_narrative_is_not_flat() {
        let arc = sentiment_arc(&segs(&[
            "She smiled at her loyal friends and laughed, grateful for the gentle evening.",
            "He wept alone in the darkness, terrified and ashamed of his betrayal.",
        ]));
        assert!(arc[0].polarity > 0.3, "{:?}", arc);
        assert!(arc[1].polarity < -0.3, "{:?}", arc);
    }

    #[test]
    fn polarity_is_bounded() {
        let p = polarity("extremely excellent extremely perfect extremely superb");
        assert!((-1.0..=1.0).contains(&p));
    }

    #[test]
    fn arc_preserves_order_with_one_based_numbers() {
        let arc = sentiment_arc(&segs(&["Good times.", "Neutral text.", "Awful end."]));
        let numbers: Vec<_> = arc.iter().map(|p| p.segment).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(arc[0].polarity > 0.0);
        assert_eq!(arc[1].polarity, 0.0);
        assert!(arc[2].polarity < 0.0);
    }

    #[test]
    fn keywords_skip_short_words_and_rank_by_count() {
        let cfg = AnalyticsConfig::default();
        let kws = keyword_frequency(
            &segs(&[
                "Whales swim. The ocean holds whales and oceans.",
                "Whales again, ocean again, plankton.",
            ]),
            &cfg,
        );
        assert_eq!(kws[0], KeywordCount { term: "whales".into(), count: 3 });
        assert_eq!(kws[1], KeywordCount { term: "ocean".into(), count: 2 });
        assert_eq!(kws[2], KeywordCount { term: "again".into(), count: 2 });
        assert!(kws.iter().all(|k| k.term.chars().count() > 4));
        assert!(!kws.iter().any(|k| k.term == "swim"));
    }

    #[test]
    fn keywords_are_capped() {
        let text = (0..30)
            .map(|i| format!("keyword{:02}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let kws = keyword_frequency(&segs(&[text.as_str()]), &AnalyticsConfig::default());
        assert_eq!(kws.len(), 10);
        assert_eq!(kws[0].term, "keyword00");
    }

    #[test]
    fn insights_bundle_all_three() {
        let result = insights(
            &segs(&["Happy readers enjoy wonderful stories."]),
            &AnalyticsConfig::default(),
        );
        assert!(result.readability.is_some());
        assert_eq!(result.sentiment_arc.len(), 1);
        assert!(!result.keywords.is_empty());
    }
}
