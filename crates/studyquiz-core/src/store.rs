//! Persistence boundary.
//!
//! The engines only need keyed get/put with compare-and-swap versions: quizzes
//! are versioned individually, coursework is versioned per course so a whole
//! course ledger is read, validated and written as one unit.
//!
//! `MemoryStore` is the in-process implementation. It can be snapshotted to
//! JSON, which is how the CLI persists state between runs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{CourseId, CourseLedger, CourseworkId, Quiz, QuizId};

/// A stored value with its compare-and-swap version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// Storage for quizzes.
pub trait QuizStore: Send + Sync {
    fn get_quiz(&self, id: QuizId) -> Result<Option<Versioned<Quiz>>, StoreError>;

    /// All quizzes of a course, oldest first.
    fn quizzes_for_course(&self, course: &CourseId) -> Result<Vec<Quiz>, StoreError>;

    /// Write a quiz. `expected_version` of `None` inserts a new quiz; `Some(v)`
    /// replaces the stored quiz only if it is still at version `v`. Returns
    /// the new version.
    fn put_quiz(&self, quiz: &Quiz, expected_version: Option<u64>) -> Result<u64, StoreError>;
}

/// Storage for course ledgers.
pub trait CourseworkStore: Send + Sync {
    /// Load a course ledger. Unknown courses yield an empty ledger at
    /// version 0.
    fn load_course(&self, course: &CourseId) -> Result<Versioned<CourseLedger>, StoreError>;

    /// Replace a ledger if it is still at `expected_version`. Returns the new
    /// version.
    fn commit_course(&self, ledger: &CourseLedger, expected_version: u64) -> Result<u64, StoreError>;

    /// Course that owns a coursework item.
    fn locate_item(&self, item: CourseworkId) -> Result<Option<CourseId>, StoreError>;
}

/// Serializable image of a `MemoryStore`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub quizzes: Vec<Versioned<Quiz>>,
    #[serde(default)]
    pub courses: Vec<Versioned<CourseLedger>>,
}

/// In-memory store guarded by read/write locks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    quizzes: RwLock<HashMap<QuizId, Versioned<Quiz>>>,
    courses: RwLock<HashMap<CourseId, Versioned<CourseLedger>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let quizzes = snapshot
            .quizzes
            .into_iter()
            .map(|q| (q.value.id, q))
            .collect();
        let courses = snapshot
            .courses
            .into_iter()
            .map(|c| (c.value.course_id.clone(), c))
            .collect();
        Self {
            quizzes: RwLock::new(quizzes),
            courses: RwLock::new(courses),
        }
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let mut quizzes: Vec<_> = self
            .quizzes
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .values()
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| {
            a.value
                .created_at
                .cmp(&b.value.created_at)
                .then(a.value.id.cmp(&b.value.id))
        });

        let mut courses: Vec<_> = self
            .courses
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .values()
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.value.course_id.cmp(&b.value.course_id));

        Ok(StoreSnapshot { quizzes, courses })
    }

    /// Save the store as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot()?;
        let json = serde_json::to_string_pretty(&snapshot).context("failed to serialize store")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write state to {}", path.display()))?;
        Ok(())
    }

    /// Load a store from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state from {}", path.display()))?;
        let snapshot: StoreSnapshot =
            serde_json::from_str(&content).context("failed to parse state JSON")?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Load from `path` if it exists, otherwise start empty.
    pub fn open_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_json(path)
        } else {
            Ok(Self::new())
        }
    }
}

impl QuizStore for MemoryStore {
    fn get_quiz(&self, id: QuizId) -> Result<Option<Versioned<Quiz>>, StoreError> {
        let quizzes = self.quizzes.read().map_err(|_| StoreError::Poisoned)?;
        Ok(quizzes.get(&id).cloned())
    }

    fn quizzes_for_course(&self, course: &CourseId) -> Result<Vec<Quiz>, StoreError> {
        let quizzes = self.quizzes.read().map_err(|_| StoreError::Poisoned)?;
        let mut found: Vec<Quiz> = quizzes
            .values()
            .filter(|q| &q.value.course_id == course)
            .map(|q| q.value.clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    fn put_quiz(&self, quiz: &Quiz, expected_version: Option<u64>) -> Result<u64, StoreError> {
        let mut quizzes = self.quizzes.write().map_err(|_| StoreError::Poisoned)?;
        let current = quizzes.get(&quiz.id).map(|q| q.version);

        let version = match (expected_version, current) {
            (None, None) => 1,
            (None, Some(_)) => return Err(StoreError::AlreadyExists(quiz.id.to_string())),
            (Some(expected), actual) if actual != Some(expected) => {
                return Err(StoreError::VersionConflict {
                    expected,
                    actual: actual.unwrap_or(0),
                })
            }
            (Some(expected), _) => expected + 1,
        };

        quizzes.insert(
            quiz.id,
            Versioned {
                value: quiz.clone(),
                version,
            },
        );
        Ok(version)
    }
}

impl CourseworkStore for MemoryStore {
    fn load_course(&self, course: &CourseId) -> Result<Versioned<CourseLedger>, StoreError> {
        let courses = self.courses.read().map_err(|_| StoreError::Poisoned)?;
        Ok(courses.get(course).cloned().unwrap_or_else(|| Versioned {
            value: CourseLedger::empty(course.clone()),
            version: 0,
        }))
    }

    fn commit_course(&self, ledger: &CourseLedger, expected_version: u64) -> Result<u64, StoreError> {
        let mut courses = self.courses.write().map_err(|_| StoreError::Poisoned)?;
        let actual = courses.get(&ledger.course_id).map_or(0, |c| c.version);
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual,
            });
        }

        let version = actual + 1;
        courses.insert(
            ledger.course_id.clone(),
            Versioned {
                value: ledger.clone(),
                version,
            },
        );
        Ok(version)
    }

    fn locate_item(&self, item: CourseworkId) -> Result<Option<CourseId>, StoreError> {
        let courses = self.courses.read().map_err(|_| StoreError::Poisoned)?;
        Ok(courses
            .values()
            .find(|c| c.value.items.iter().any(|i| i.id == item))
            .map(|c| c.value.course_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseworkItem, QuizDraft};

    fn quiz(course: &str) -> Quiz {
        Quiz::from_draft(
            QuizDraft {
                name: "q".into(),
                questions: vec![],
            },
            CourseId::new(course),
        )
    }

    #[test]
    fn quiz_put_is_compare_and_swap() {
        let store = MemoryStore::new();
        let q = quiz("c1");

        assert_eq!(store.put_quiz(&q, None).unwrap(), 1);
        assert!(matches!(
            store.put_quiz(&q, None),
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(store.put_quiz(&q, Some(1)).unwrap(), 2);
        assert!(matches!(
            store.put_quiz(&q, Some(1)),
            Err(StoreError::VersionConflict {
                expected: 1,
                actual: 2
            })
        ));
        assert_eq!(store.get_quiz(q.id).unwrap().unwrap().version, 2);
    }

    #[test]
    fn quizzes_are_scoped_by_course() {
        let store = MemoryStore::new();
        store.put_quiz(&quiz("c1"), None).unwrap();
        store.put_quiz(&quiz("c1"), None).unwrap();
        store.put_quiz(&quiz("c2"), None).unwrap();
        assert_eq!(store.quizzes_for_course(&CourseId::new("c1")).unwrap().len(), 2);
        assert!(store
            .quizzes_for_course(&CourseId::new("none"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn course_commit_checks_version() {
        let store = MemoryStore::new();
        let course = CourseId::new("c1");
        let loaded = store.load_course(&course).unwrap();
        assert_eq!(loaded.version, 0);
        assert!(loaded.value.items.is_empty());

        let mut ledger = loaded.value;
        let item = CourseworkItem {
            id: CourseworkId::new(),
            course_id: course.clone(),
            name: "Essay".into(),
            weight: 0.4,
            grade: None,
            quiz_id: None,
        };
        ledger.items.push(item.clone());

        assert_eq!(store.commit_course(&ledger, 0).unwrap(), 1);
        assert!(matches!(
            store.commit_course(&ledger, 0),
            Err(StoreError::VersionConflict { .. })
        ));
        assert_eq!(store.locate_item(item.id).unwrap(), Some(course));
        assert_eq!(store.locate_item(CourseworkId::new()).unwrap(), None);
    }

    #[test]
    fn json_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("store.json");

        let store = MemoryStore::new();
        let q = quiz("c1");
        store.put_quiz(&q, None).unwrap();
        store.save_json(&path).unwrap();

        let loaded = MemoryStore::open_or_default(&path).unwrap();
        let got = loaded.get_quiz(q.id).unwrap().unwrap();
        assert_eq!(got.version, 1);
        assert_eq!(got.value.name, "q");

        let fresh = MemoryStore::open_or_default(&dir.path().join("missing.json")).unwrap();
        assert!(fresh.snapshot().unwrap().quizzes.is_empty());
    }
}
