use crate::detect::{BBox, RawDetection};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain-level classification of an accepted event.
///
/// `Ord` follows declaration order, so maps keyed by category iterate in the
/// same fixed order the report summary is expected in.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Garbage,
    Pothole,
    BrokenRoad,
    NoHelmet,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Garbage,
        Category::Pothole,
        Category::BrokenRoad,
        Category::NoHelmet,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Garbage => "garbage",
            Category::Pothole => "pothole",
            Category::BrokenRoad => "broken_road",
            Category::NoHelmet => "no_helmet",
        }
    }

    /// Parses a comma-separated category list; empty segments from trailing
    /// or doubled commas are skipped, and an empty selection means all.
    pub fn parse_list(input: &str) -> Result<Vec<Category>> {
        let categories = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Category>>>()?;
        if categories.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        Ok(categories)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "garbage" => Ok(Category::Garbage),
            "pothole" => Ok(Category::Pothole),
            "broken_road" => Ok(Category::BrokenRoad),
            "no_helmet" => Ok(Category::NoHelmet),
            other => bail!("unknown category: {other}"),
        }
    }
}

/// A classified detection waiting on the deduplication decision.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub category: Category,
    pub label: String,
    pub confidence: f32,
    pub bbox: BBox,
}

/// Keyword rules mapping a raw detector label to one category.
#[derive(Clone, Debug, Default)]
pub struct LabelRule {
    /// Case-insensitive whole-label matches.
    pub exact: Vec<String>,
    /// Case-insensitive substring matches.
    pub contains: Vec<String>,
}

impl LabelRule {
    fn matches(&self, label: &str) -> bool {
        self.exact.iter().any(|k| k == label)
            || self.contains.iter().any(|k| label.contains(k.as_str()))
    }
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Label classification rules for the label-driven categories.
///
/// The helmet case is not a label rule; see [`HelmetRule`].
#[derive(Clone, Debug)]
pub struct CategoryRules {
    rules: Vec<(Category, LabelRule)>,
}

impl CategoryRules {
    /// Default keyword rules for every label-driven category.
    pub fn defaults() -> Self {
        Self {
            rules: vec![
                (
                    Category::Garbage,
                    LabelRule {
                        exact: keywords(&[
                            "trash", "garbage", "waste", "litter", "bottle", "can", "plastic",
                        ]),
                        contains: keywords(&["garbage"]),
                    },
                ),
                (
                    Category::Pothole,
                    LabelRule {
                        exact: vec![],
                        contains: keywords(&["pothole"]),
                    },
                ),
                (
                    Category::BrokenRoad,
                    LabelRule {
                        exact: vec![],
                        contains: keywords(&["crack", "damage"]),
                    },
                ),
            ],
        }
    }

    /// Restricts the default rules to the selected categories.
    pub fn for_categories(selected: &[Category]) -> Self {
        let rules = Self::defaults()
            .rules
            .into_iter()
            .filter(|(category, _)| selected.contains(category))
            .collect();
        Self { rules }
    }

    /// Maps a raw detector label to at most one category; the first matching
    /// rule wins, so a detection is never counted twice.
    pub fn classify(&self, raw_label: &str) -> Option<Category> {
        let label = raw_label.to_lowercase();
        self.rules
            .iter()
            .find(|(_, rule)| rule.matches(&label))
            .map(|(category, _)| *category)
    }
}

/// Co-occurrence rule for riders without helmets.
///
/// A person box near a two-wheeler box with no helmet box over the rider
/// yields a synthetic `no_helmet` candidate.
#[derive(Clone, Debug)]
pub struct HelmetRule {
    pub person_labels: Vec<String>,
    pub vehicle_labels: Vec<String>,
    pub helmet_labels: Vec<String>,
    /// Pixels the person box is grown by when testing vehicle and helmet
    /// overlap.
    pub proximity: f32,
}

impl Default for HelmetRule {
    fn default() -> Self {
        Self {
            person_labels: keywords(&["person"]),
            vehicle_labels: keywords(&["motorcycle", "bicycle"]),
            helmet_labels: keywords(&["helmet"]),
            proximity: 50.0,
        }
    }
}

impl HelmetRule {
    fn labelled<'a>(
        &self,
        detections: &'a [RawDetection],
        labels: &[String],
    ) -> Vec<&'a RawDetection> {
        detections
            .iter()
            .filter(|d| labels.iter().any(|l| d.label.to_lowercase() == *l))
            .collect()
    }

    /// Emits one candidate per rider whose person box touches a two-wheeler
    /// box while no helmet box touches the rider. Confidence is the minimum
    /// of the person and vehicle confidences; the bounding box is the
    /// person's.
    pub fn violations(&self, detections: &[RawDetection]) -> Vec<Candidate> {
        let people = self.labelled(detections, &self.person_labels);
        let vehicles = self.labelled(detections, &self.vehicle_labels);
        let helmets = self.labelled(detections, &self.helmet_labels);

        let mut candidates = Vec::new();
        for person in people {
            let zone = person.bbox.expanded(self.proximity);
            let Some(vehicle) = vehicles.iter().find(|v| v.bbox.intersects(&zone)) else {
                continue;
            };
            if helmets.iter().any(|h| h.bbox.intersects(&zone)) {
                continue;
            }
            candidates.push(Candidate {
                category: Category::NoHelmet,
                label: person.label.clone(),
                confidence: person.confidence.min(vehicle.confidence),
                bbox: person.bbox,
            });
        }
        candidates
    }
}

/// Classifies one frame's raw detections into category candidates: label
/// rules first, then the helmet co-occurrence rule when it is enabled.
pub fn classify_frame(
    detections: &[RawDetection],
    rules: &CategoryRules,
    helmet: Option<&HelmetRule>,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = detections
        .iter()
        .filter_map(|detection| {
            rules.classify(&detection.label).map(|category| Candidate {
                category,
                label: detection.label.clone(),
                confidence: detection.confidence,
                bbox: detection.bbox,
            })
        })
        .collect();

    if let Some(rule) = helmet {
        candidates.extend(rule.violations(detections));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(label: &str, confidence: f32, bbox: BBox) -> RawDetection {
        RawDetection {
            label: label.to_string(),
            confidence,
            bbox,
        }
    }

    #[test]
    fn test_classify_exact_keyword_case_insensitive() {
        let rules = CategoryRules::defaults();

        assert_eq!(rules.classify("bottle"), Some(Category::Garbage));
        assert_eq!(rules.classify("Bottle"), Some(Category::Garbage));
        assert_eq!(rules.classify("TRASH"), Some(Category::Garbage));
    }

    #[test]
    fn test_classify_substring_keywords() {
        let rules = CategoryRules::defaults();

        assert_eq!(rules.classify("garbage truck"), Some(Category::Garbage));
        assert_eq!(rules.classify("small pothole"), Some(Category::Pothole));
        assert_eq!(rules.classify("road crack"), Some(Category::BrokenRoad));
        assert_eq!(rules.classify("surface damage"), Some(Category::BrokenRoad));
    }

    #[test]
    fn test_unmatched_label_is_dropped() {
        let rules = CategoryRules::defaults();

        assert_eq!(rules.classify("dog"), None);
        assert_eq!(rules.classify(""), None);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rules = CategoryRules::defaults();

        // Matches both the garbage substring and the pothole substring;
        // garbage is evaluated first.
        assert_eq!(
            rules.classify("garbage near pothole"),
            Some(Category::Garbage)
        );
    }

    #[test]
    fn test_for_categories_restricts_rules() {
        let rules = CategoryRules::for_categories(&[Category::Pothole]);

        assert_eq!(rules.classify("bottle"), None);
        assert_eq!(rules.classify("pothole"), Some(Category::Pothole));
    }

    #[test]
    fn test_parse_list_empty_selects_all() {
        let categories = Category::parse_list("").unwrap();
        assert_eq!(categories, Category::ALL.to_vec());
    }

    #[test]
    fn test_parse_list_subset_and_unknown() {
        let categories = Category::parse_list("garbage, no_helmet").unwrap();
        assert_eq!(categories, vec![Category::Garbage, Category::NoHelmet]);

        assert!(Category::parse_list("garbage,unicorn").is_err());
    }

    #[test]
    fn test_parse_list_skips_empty_segments() {
        let categories = Category::parse_list("garbage,").unwrap();
        assert_eq!(categories, vec![Category::Garbage]);

        let categories = Category::parse_list("garbage,,pothole, ").unwrap();
        assert_eq!(categories, vec![Category::Garbage, Category::Pothole]);

        // only separators is the same as no selection
        let categories = Category::parse_list(",").unwrap();
        assert_eq!(categories, Category::ALL.to_vec());
    }

    #[test]
    fn test_helmet_violation_emitted() {
        let rule = HelmetRule::default();
        let detections = vec![
            detection("person", 0.9, BBox::new(100.0, 50.0, 160.0, 200.0)),
            detection("motorcycle", 0.7, BBox::new(90.0, 120.0, 200.0, 260.0)),
        ];

        let candidates = rule.violations(&detections);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].category, Category::NoHelmet);
        assert_eq!(candidates[0].label, "person");
        // min of the person and vehicle confidences
        assert!((candidates[0].confidence - 0.7).abs() < 1e-6);
        // the person's box is carried
        assert_eq!(candidates[0].bbox, BBox::new(100.0, 50.0, 160.0, 200.0));
    }

    #[test]
    fn test_helmet_presence_suppresses_violation() {
        let rule = HelmetRule::default();
        let detections = vec![
            detection("person", 0.9, BBox::new(100.0, 50.0, 160.0, 200.0)),
            detection("motorcycle", 0.7, BBox::new(90.0, 120.0, 200.0, 260.0)),
            detection("helmet", 0.8, BBox::new(110.0, 30.0, 150.0, 70.0)),
        ];

        assert!(rule.violations(&detections).is_empty());
    }

    #[test]
    fn test_person_without_nearby_vehicle_is_ignored() {
        let rule = HelmetRule::default();
        let detections = vec![
            detection("person", 0.9, BBox::new(100.0, 50.0, 160.0, 200.0)),
            detection("motorcycle", 0.7, BBox::new(800.0, 500.0, 900.0, 640.0)),
        ];

        assert!(rule.violations(&detections).is_empty());
    }

    #[test]
    fn test_classify_frame_combines_label_rules_and_helmet_rule() {
        let rules = CategoryRules::defaults();
        let helmet = HelmetRule::default();
        let detections = vec![
            detection("bottle", 0.6, BBox::new(0.0, 0.0, 10.0, 10.0)),
            detection("person", 0.9, BBox::new(100.0, 50.0, 160.0, 200.0)),
            detection("bicycle", 0.8, BBox::new(90.0, 120.0, 200.0, 260.0)),
            detection("dog", 0.9, BBox::new(300.0, 300.0, 350.0, 350.0)),
        ];

        let candidates = classify_frame(&detections, &rules, Some(&helmet));

        let categories: Vec<Category> = candidates.iter().map(|c| c.category).collect();
        assert_eq!(categories, vec![Category::Garbage, Category::NoHelmet]);
    }
}
