//! Candidate scoring and ranking.
//!
//! Scores combine four signals, each in `[0, 1]`:
//! - name similarity between the candidate and the queried city;
//! - plausibility of the administrative level for a city;
//! - completeness of recognised boundary tags;
//! - geometry validity.
//!
//! A candidate whose geometry is missing or degenerate scores `0.0` and is
//! dropped before ranking. Weights are configurable via [`ScoringPolicy`].

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde_json::Value;
use strsim::normalized_levenshtein;

use super::boundary::{CandidateQuery, OsmBoundary, OsmType, RawBoundaryCandidate};
use super::geometry;

const RECOGNISED_TAGS: [&str; 6] = ["name", "boundary", "admin_level", "place", "wikidata", "type"];
const COUNTRY_CODE_TAGS: [&str; 3] = ["ISO3166-1:alpha2", "is_in:country_code", "addr:country"];
const CITY_PLACE_VALUES: [&str; 4] = ["city", "town", "municipality", "village"];

/// Relative weight of each scoring signal. Normalised by their sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Weight of the name similarity signal.
    pub name: f64,
    /// Weight of the administrative level signal.
    pub admin_level: f64,
    /// Weight of the tag completeness signal.
    pub tags: f64,
    /// Weight of the geometry validity signal.
    pub geometry: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            name: 0.5,
            admin_level: 0.25,
            tags: 0.15,
            geometry: 0.1,
        }
    }
}

impl ScoringWeights {
    fn normalised(self) -> Self {
        let clamp = |weight: f64| if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        let raw = Self {
            name: clamp(self.name),
            admin_level: clamp(self.admin_level),
            tags: clamp(self.tags),
            geometry: clamp(self.geometry),
        };
        let total = raw.name + raw.admin_level + raw.tags + raw.geometry;
        if total <= 0.0 {
            return Self::default().normalised();
        }
        Self {
            name: raw.name / total,
            admin_level: raw.admin_level / total,
            tags: raw.tags / total,
            geometry: raw.geometry / total,
        }
    }
}

/// Scoring configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    /// Signal weights.
    pub weights: ScoringWeights,
    /// Minimum score for the top candidate to be suggested as default.
    pub acceptance_threshold: f64,
    /// Scores closer than this to a group's leader rank as ties.
    pub tie_epsilon: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            acceptance_threshold: 0.6,
            tie_epsilon: 0.02,
        }
    }
}

/// Result of ranking a provider response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ranking {
    /// Usable candidates, best first.
    pub ranked: Vec<OsmBoundary>,
    /// Candidates dropped for missing or degenerate geometry.
    pub discarded: usize,
}

/// Deterministic, side-effect free candidate scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScorer {
    policy: ScoringPolicy,
    weights: ScoringWeights,
}

impl Default for CandidateScorer {
    fn default() -> Self {
        Self::new(ScoringPolicy::default())
    }
}

impl CandidateScorer {
    /// Build a scorer for the given policy.
    pub fn new(policy: ScoringPolicy) -> Self {
        Self {
            policy,
            weights: policy.weights.normalised(),
        }
    }

    /// The configured policy.
    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// `true` when the candidate geometry has positive extent on both axes.
    pub fn has_usable_geometry(candidate: &RawBoundaryCandidate) -> bool {
        geometry::bounds(candidate.geometry.as_ref()).is_some_and(|bounds| !bounds.is_degenerate())
    }

    /// Score a candidate against the query, in `[0, 1]`.
    pub fn score(&self, candidate: &RawBoundaryCandidate, query: &CandidateQuery) -> f64 {
        if !Self::has_usable_geometry(candidate) {
            return 0.0;
        }

        let weighted = self.weights.name * name_similarity(&candidate.name, &query.city_name)
            + self.weights.admin_level * admin_level_plausibility(candidate)
            + self.weights.tags * tag_completeness(candidate, query)
            + self.weights.geometry * geometry_quality(candidate);
        weighted.clamp(0.0, 1.0)
    }

    /// Attach a score to a candidate.
    pub fn score_candidate(
        &self,
        candidate: RawBoundaryCandidate,
        query: &CandidateQuery,
    ) -> OsmBoundary {
        let score = self.score(&candidate, query);
        OsmBoundary { candidate, score }
    }

    /// Score, filter and rank a provider response.
    pub fn rank(&self, candidates: Vec<RawBoundaryCandidate>, query: &CandidateQuery) -> Ranking {
        let total = candidates.len();
        let scored = candidates
            .into_iter()
            .filter(Self::has_usable_geometry)
            .map(|candidate| self.score_candidate(candidate, query))
            .collect::<Vec<_>>();
        let discarded = total - scored.len();

        Ranking {
            ranked: rank_scored(scored, self.policy.tie_epsilon),
            discarded,
        }
    }

    /// The top candidate when it clears the acceptance threshold.
    pub fn suggest<'a>(&self, ranked: &'a [OsmBoundary]) -> Option<&'a OsmBoundary> {
        ranked
            .first()
            .filter(|top| top.score >= self.policy.acceptance_threshold)
    }
}

/// Order scored candidates best first.
///
/// Candidates are sorted by descending score and then grouped: a candidate
/// joins the current group while its score is within `tie_epsilon` of the
/// group's first member. Inside a group, relations precede ways, larger areas
/// precede smaller or unknown ones, then score and `osm_id` decide.
pub fn rank_scored(mut scored: Vec<OsmBoundary>, tie_epsilon: f64) -> Vec<OsmBoundary> {
    let epsilon = if tie_epsilon.is_finite() { tie_epsilon.max(0.0) } else { 0.0 };
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| tie_break(a, b)));

    let mut ranked = Vec::with_capacity(scored.len());
    let mut group: Vec<OsmBoundary> = Vec::new();
    for candidate in scored {
        let joins_group = group
            .first()
            .is_some_and(|leader| leader.score - candidate.score <= epsilon);
        if !joins_group {
            flush_group(&mut group, &mut ranked);
        }
        group.push(candidate);
    }
    flush_group(&mut group, &mut ranked);
    ranked
}

fn flush_group(group: &mut Vec<OsmBoundary>, ranked: &mut Vec<OsmBoundary>) {
    group.sort_by(tie_break);
    ranked.append(group);
}

fn tie_break(a: &OsmBoundary, b: &OsmBoundary) -> Ordering {
    type_rank(b.candidate.osm_type)
        .cmp(&type_rank(a.candidate.osm_type))
        .then_with(|| compare_area_desc(a.candidate.area, b.candidate.area))
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.candidate.osm_id.cmp(&b.candidate.osm_id))
}

fn type_rank(osm_type: OsmType) -> u8 {
    match osm_type {
        OsmType::Relation => 1,
        OsmType::Way => 0,
    }
}

fn compare_area_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    let known = |area: Option<f64>| area.filter(|value| value.is_finite());
    match (known(a), known(b)) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Lowercase ASCII transliteration used for name comparison.
fn fold(value: &str) -> String {
    deunicode::deunicode(value).to_lowercase()
}

fn tokens(folded: &str) -> BTreeSet<&str> {
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Similarity of two names in `[0, 1]`, insensitive to case and diacritics.
///
/// The larger of the token Dice coefficient and the normalised Levenshtein
/// similarity of the folded strings.
pub fn name_similarity(candidate: &str, query: &str) -> f64 {
    let candidate = fold(candidate);
    let query = fold(query);
    let candidate_tokens = tokens(&candidate);
    let query_tokens = tokens(&query);
    if candidate_tokens.is_empty() || query_tokens.is_empty() {
        return 0.0;
    }

    let shared = candidate_tokens.intersection(&query_tokens).count();
    let dice = (2 * shared) as f64 / (candidate_tokens.len() + query_tokens.len()) as f64;

    let candidate_joined = candidate_tokens.iter().copied().collect::<Vec<_>>().join(" ");
    let query_joined = query_tokens.iter().copied().collect::<Vec<_>>().join(" ");
    let edit = normalized_levenshtein(&candidate_joined, &query_joined);

    dice.max(edit).clamp(0.0, 1.0)
}

fn admin_level_plausibility(candidate: &RawBoundaryCandidate) -> f64 {
    match candidate.admin_level {
        Some(8) => 1.0,
        Some(7 | 9) => 0.8,
        Some(6 | 10) => 0.55,
        Some(5) => 0.35,
        Some(4) => 0.2,
        Some(2 | 3) => 0.05,
        _ if has_city_place_tag(candidate) => 0.7,
        _ => 0.3,
    }
}

fn has_city_place_tag(candidate: &RawBoundaryCandidate) -> bool {
    candidate
        .tags
        .get("place")
        .and_then(Value::as_str)
        .is_some_and(|place| CITY_PLACE_VALUES.contains(&place))
}

fn tag_completeness(candidate: &RawBoundaryCandidate, query: &CandidateQuery) -> f64 {
    let present = RECOGNISED_TAGS
        .iter()
        .filter(|key| candidate.tags.contains_key(**key))
        .count();
    let completeness = present as f64 / RECOGNISED_TAGS.len() as f64;

    let country_mismatch = query.country_code.as_deref().is_some_and(|expected| {
        COUNTRY_CODE_TAGS.iter().any(|key| {
            candidate
                .tags
                .get(*key)
                .and_then(Value::as_str)
                .is_some_and(|actual| !actual.trim().eq_ignore_ascii_case(expected.trim()))
        })
    });

    if country_mismatch {
        completeness / 2.0
    } else {
        completeness
    }
}

fn geometry_quality(candidate: &RawBoundaryCandidate) -> f64 {
    let kind = candidate
        .geometry
        .as_ref()
        .and_then(|geometry| geometry.get("type"))
        .and_then(Value::as_str);
    match kind {
        Some("Polygon" | "MultiPolygon") => 1.0,
        _ => 0.5,
    }
}

#[cfg(test)]
mod tests {
    //! Scoring signals, determinism and tie ordering.

    use super::*;
    use crate::domain::boundary::BoundaryTags;
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn square(size: f64) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [size, 0.0], [size, size], [0.0, size], [0.0, 0.0]]]
        })
    }

    fn candidate(osm_id: &str, osm_type: OsmType, name: &str) -> RawBoundaryCandidate {
        RawBoundaryCandidate {
            osm_id: osm_id.to_owned(),
            osm_type,
            name: name.to_owned(),
            admin_level: Some(8),
            boundary_type: "administrative".to_owned(),
            area: None,
            geometry: Some(square(0.1)),
            tags: BoundaryTags::from([
                ("name".to_owned(), json!(name)),
                ("boundary".to_owned(), json!("administrative")),
                ("admin_level".to_owned(), json!("8")),
            ]),
        }
    }

    fn scored(osm_id: &str, osm_type: OsmType, score: f64, area: Option<f64>) -> OsmBoundary {
        let mut candidate = candidate(osm_id, osm_type, osm_id);
        candidate.area = area;
        OsmBoundary { candidate, score }
    }

    #[fixture]
    fn query() -> CandidateQuery {
        CandidateQuery::new("Springfield", "US").with_country_code("US")
    }

    #[rstest]
    #[case("Springfield", "Springfield", 1.0)]
    #[case("Zürich", "zurich", 1.0)]
    #[case("SÃO PAULO", "São Paulo", 1.0)]
    fn name_similarity_ignores_case_and_diacritics(
        #[case] candidate: &str,
        #[case] query: &str,
        #[case] expected: f64,
    ) {
        assert!((name_similarity(candidate, query) - expected).abs() < f64::EPSILON);
    }

    #[rstest]
    fn name_similarity_rewards_partial_overlap() {
        let partial = name_similarity("Springfield Township", "Springfield");
        let unrelated = name_similarity("Shelbyville", "Springfield");
        assert!(partial > 0.6 && partial < 1.0, "partial overlap was {partial}");
        assert!(unrelated < partial);
    }

    #[rstest]
    #[case("Springfeld", "Springfield", 1.0 - 1.0 / 11.0)]
    #[case("Lyon", "Lyons", 0.8)]
    #[case("Köln", "Koeln", 0.8)]
    fn name_similarity_tolerates_single_edits(
        #[case] candidate: &str,
        #[case] query: &str,
        #[case] expected: f64,
    ) {
        let similarity = name_similarity(candidate, query);
        assert!((similarity - expected).abs() < 1e-9, "similarity was {similarity}");
    }

    #[rstest]
    fn name_similarity_of_blank_names_is_zero() {
        assert_eq!(name_similarity("", "Springfield"), 0.0);
        assert_eq!(name_similarity("Springfield", " - "), 0.0);
    }

    #[rstest]
    fn scores_stay_within_unit_interval(query: CandidateQuery) {
        let scorer = CandidateScorer::default();
        let mut best = candidate("1", OsmType::Relation, "Springfield");
        best.tags.insert("place".to_owned(), json!("city"));
        best.tags.insert("wikidata".to_owned(), json!("Q28515"));
        best.tags.insert("type".to_owned(), json!("boundary"));

        let score = scorer.score(&best, &query);
        assert!((0.0..=1.0).contains(&score));
        assert!((score - 1.0).abs() < 1e-9, "complete match should score 1, got {score}");
    }

    #[rstest]
    fn scoring_is_deterministic(query: CandidateQuery) {
        let scorer = CandidateScorer::default();
        let candidate = candidate("7", OsmType::Way, "Springfield Township");
        let first = scorer.score(&candidate, &query);
        for _ in 0..10 {
            assert_eq!(scorer.score(&candidate, &query).to_bits(), first.to_bits());
        }
    }

    #[rstest]
    fn city_level_outranks_country_level(query: CandidateQuery) {
        let scorer = CandidateScorer::default();
        let city = candidate("1", OsmType::Relation, "Springfield");
        let mut country = city.clone();
        country.admin_level = Some(2);

        assert!(scorer.score(&city, &query) > scorer.score(&country, &query));
    }

    #[rstest]
    fn place_tag_backs_up_missing_admin_level() {
        let mut tagged = candidate("1", OsmType::Way, "Springfield");
        tagged.admin_level = None;
        let untagged = tagged.clone();
        tagged.tags.insert("place".to_owned(), json!("town"));

        assert!(admin_level_plausibility(&tagged) > admin_level_plausibility(&untagged));
    }

    #[rstest]
    fn missing_tags_lower_confidence(query: CandidateQuery) {
        let scorer = CandidateScorer::default();
        let tagged = candidate("1", OsmType::Way, "Springfield");
        let mut bare = tagged.clone();
        bare.tags.clear();

        assert!(scorer.score(&tagged, &query) > scorer.score(&bare, &query));
    }

    #[rstest]
    fn foreign_country_tag_lowers_confidence(query: CandidateQuery) {
        let scorer = CandidateScorer::default();
        let local = candidate("1", OsmType::Way, "Springfield");
        let mut foreign = local.clone();
        foreign
            .tags
            .insert("ISO3166-1:alpha2".to_owned(), json!("CA"));

        assert!(scorer.score(&local, &query) > scorer.score(&foreign, &query));
    }

    #[rstest]
    #[case::missing(None)]
    #[case::point(Some(json!({ "type": "Point", "coordinates": [1, 2] })))]
    #[case::flat_line(Some(json!({ "type": "LineString", "coordinates": [[0, 0], [1, 0]] })))]
    #[case::garbage(Some(json!({ "type": "Polygon", "coordinates": "nope" })))]
    fn degenerate_geometry_scores_zero_and_is_filtered(
        query: CandidateQuery,
        #[case] geometry: Option<Value>,
    ) {
        let scorer = CandidateScorer::default();
        let mut broken = candidate("2", OsmType::Relation, "Springfield");
        broken.geometry = geometry;

        assert_eq!(scorer.score(&broken, &query), 0.0);

        let ranking = scorer.rank(
            vec![broken, candidate("3", OsmType::Way, "Springfield")],
            &query,
        );
        assert_eq!(ranking.discarded, 1);
        assert_eq!(ranking.ranked.len(), 1);
        assert_eq!(ranking.ranked[0].candidate.osm_id, "3");
    }

    #[rstest]
    fn ranking_orders_by_score_descending() {
        let ranked = rank_scored(
            vec![
                scored("low", OsmType::Relation, 0.3, None),
                scored("high", OsmType::Way, 0.9, None),
                scored("mid", OsmType::Way, 0.6, None),
            ],
            0.02,
        );
        let ids = ranked
            .iter()
            .map(|c| c.candidate.osm_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["high", "mid", "low"]);
    }

    #[rstest]
    fn ties_prefer_relations_then_larger_area() {
        let ranked = rank_scored(
            vec![
                scored("way-big", OsmType::Way, 0.80, Some(500.0)),
                scored("rel-small", OsmType::Relation, 0.79, Some(10.0)),
                scored("rel-big", OsmType::Relation, 0.795, Some(90.0)),
                scored("rel-unknown", OsmType::Relation, 0.80, None),
            ],
            0.02,
        );
        let ids = ranked
            .iter()
            .map(|c| c.candidate.osm_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["rel-big", "rel-small", "rel-unknown", "way-big"]);
    }

    #[rstest]
    fn springfield_relation_wins_tie_against_way() {
        let mut way = candidate("100", OsmType::Way, "Springfield");
        way.admin_level = Some(8);
        let mut relation = candidate("200", OsmType::Relation, "Springfield Township");
        relation.admin_level = Some(6);

        let ranked = rank_scored(
            vec![
                OsmBoundary {
                    candidate: way,
                    score: 0.71,
                },
                OsmBoundary {
                    candidate: relation,
                    score: 0.70,
                },
            ],
            0.02,
        );
        assert_eq!(ranked[0].candidate.osm_type, OsmType::Relation);
        assert_eq!(ranked[0].candidate.name, "Springfield Township");
    }

    #[rstest]
    fn scores_outside_epsilon_are_not_reordered() {
        let ranked = rank_scored(
            vec![
                scored("way", OsmType::Way, 0.9, Some(1.0)),
                scored("relation", OsmType::Relation, 0.5, Some(1000.0)),
            ],
            0.02,
        );
        assert_eq!(ranked[0].candidate.osm_id, "way");
    }

    #[rstest]
    fn suggestion_respects_acceptance_threshold() {
        let scorer = CandidateScorer::new(ScoringPolicy {
            acceptance_threshold: 0.75,
            ..ScoringPolicy::default()
        });
        let strong = [scored("a", OsmType::Relation, 0.8, None)];
        let weak = [scored("b", OsmType::Relation, 0.7, None)];

        assert!(scorer.suggest(&strong).is_some());
        assert!(scorer.suggest(&weak).is_none());
        assert!(scorer.suggest(&[]).is_none());
    }

    #[rstest]
    fn invalid_weights_fall_back_to_defaults(query: CandidateQuery) {
        let broken = CandidateScorer::new(ScoringPolicy {
            weights: ScoringWeights {
                name: 0.0,
                admin_level: -1.0,
                tags: f64::NAN,
                geometry: 0.0,
            },
            ..ScoringPolicy::default()
        });
        let default = CandidateScorer::default();
        let candidate = candidate("1", OsmType::Way, "Springfield");

        assert_eq!(
            broken.score(&candidate, &query),
            default.score(&candidate, &query)
        );
    }
}
