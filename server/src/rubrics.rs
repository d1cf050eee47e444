//! In-memory rubric record store
//!
//! Rubric records are values owned by the judge context that created them;
//! an update is a full-record replacement keyed by `id`, never an in-place
//! mutation. Durable persistence is an external concern.

use log::debug;
use shared::RubricRecord;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct RubricStore {
    records: HashMap<Uuid, RubricRecord>,
}

impl RubricStore {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Inserts or replaces the record with the same id.
    ///
    /// Returns true when an existing record was replaced.
    pub fn upsert(&mut self, record: RubricRecord) -> bool {
        let id = record.id();
        let replaced = self.records.insert(id, record).is_some();
        debug!(
            "Rubric {} {}",
            id,
            if replaced { "replaced" } else { "stored" }
        );
        replaced
    }

    pub fn get(&self, id: &Uuid) -> Option<&RubricRecord> {
        self.records.get(id)
    }

    /// All records for one team, in no particular order.
    pub fn for_team(&self, team_number: &str) -> Vec<&RubricRecord> {
        self.records
            .values()
            .filter(|record| record.team_number() == team_number)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::TeamInterviewRubric;

    fn interview(id: Uuid, team_number: &str, scores: Vec<f32>) -> RubricRecord {
        RubricRecord::TeamInterview(TeamInterviewRubric {
            id,
            team_number: team_number.to_string(),
            judge_id: Uuid::new_v4(),
            rubric: scores,
        })
    }

    #[test]
    fn test_upsert_stores_new_record() {
        let mut store = RubricStore::new();
        let id = Uuid::new_v4();

        let replaced = store.upsert(interview(id, "1234A", vec![3.0]));

        assert!(!replaced);
        assert_eq!(store.len(), 1);
        assert!(store.get(&id).is_some());
    }

    #[test]
    fn test_upsert_replaces_whole_record_by_id() {
        let mut store = RubricStore::new();
        let id = Uuid::new_v4();
        store.upsert(interview(id, "1234A", vec![3.0]));

        let replaced = store.upsert(interview(id, "1234A", vec![4.0, 5.0]));

        assert!(replaced);
        assert_eq!(store.len(), 1);
        match store.get(&id).unwrap() {
            RubricRecord::TeamInterview(rubric) => assert_eq!(rubric.rubric, vec![4.0, 5.0]),
            other => panic!("unexpected record shape: {other:?}"),
        }
    }

    #[test]
    fn test_for_team_filters_by_team_number() {
        let mut store = RubricStore::new();
        store.upsert(interview(Uuid::new_v4(), "1234A", vec![3.0]));
        store.upsert(interview(Uuid::new_v4(), "1234A", vec![2.0]));
        store.upsert(interview(Uuid::new_v4(), "99", vec![1.0]));

        assert_eq!(store.for_team("1234A").len(), 2);
        assert_eq!(store.for_team("99").len(), 1);
        assert!(store.for_team("7").is_empty());
    }

    #[test]
    fn test_score_order_is_preserved() {
        let mut store = RubricStore::new();
        let id = Uuid::new_v4();
        let scores = vec![5.0, 1.0, 3.0, 2.0];
        store.upsert(interview(id, "42", scores.clone()));

        match store.get(&id).unwrap() {
            RubricRecord::TeamInterview(rubric) => assert_eq!(rubric.rubric, scores),
            other => panic!("unexpected record shape: {other:?}"),
        }
    }
}
