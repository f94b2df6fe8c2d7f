use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::models::published::{ContentView, UserSummary};

/// One course in a user's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub course_id: String,
    #[serde(default)]
    pub completed_lessons: Vec<String>,
    #[serde(default)]
    pub completed_quizzes: Vec<String>,
}

impl Enrollment {
    pub fn new(course_id: &str) -> Self {
        Self {
            course_id: course_id.to_string(),
            completed_lessons: Vec::new(),
            completed_quizzes: Vec::new(),
        }
    }
}

/// Progress change on an existing ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    CompleteLesson(String),
    /// Also revokes the lesson's quiz, if the lesson has one.
    UncompleteLesson {
        lesson_id: String,
        quiz_id: Option<String>,
    },
    CompleteQuiz(String),
    UncompleteQuiz(String),
}

impl LedgerOp {
    /// Atomic update applied to the positional `courses.$` entry.
    pub fn update_document(&self) -> Document {
        match self {
            LedgerOp::CompleteLesson(lesson_id) => {
                doc! { "$addToSet": { "courses.$.completedLessons": lesson_id } }
            }
            LedgerOp::UncompleteLesson { lesson_id, quiz_id } => match quiz_id {
                Some(quiz_id) => doc! {
                    "$pull": {
                        "courses.$.completedLessons": lesson_id,
                        "courses.$.completedQuizzes": quiz_id,
                    }
                },
                None => doc! { "$pull": { "courses.$.completedLessons": lesson_id } },
            },
            LedgerOp::CompleteQuiz(quiz_id) => {
                doc! { "$addToSet": { "courses.$.completedQuizzes": quiz_id } }
            }
            LedgerOp::UncompleteQuiz(quiz_id) => {
                doc! { "$pull": { "courses.$.completedQuizzes": quiz_id } }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizAnswerRequest {
    pub answer: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizAnswerResult {
    pub correct: bool,
    pub enrollment: Option<Enrollment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentStatus {
    pub enrolled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCheckout {
    pub id: String,
    pub course_id: String,
    pub url: Option<String>,
}

/// A course the user is enrolled in, with its published content.
#[derive(Debug, Clone, Serialize)]
pub struct EnrolledCourseView {
    #[serde(rename = "_id")]
    pub id: String,
    pub instructor: Option<UserSummary>,
    pub progress: Enrollment,
    #[serde(flatten)]
    pub content: ContentView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompleting_a_lesson_without_quiz_pulls_only_the_lesson() {
        let update = LedgerOp::UncompleteLesson {
            lesson_id: "l1".into(),
            quiz_id: None,
        }
        .update_document();
        let pull = update.get_document("$pull").unwrap();
        assert_eq!(pull.get_str("courses.$.completedLessons").unwrap(), "l1");
        assert!(!pull.contains_key("courses.$.completedQuizzes"));
    }

    #[test]
    fn quiz_answers_add_or_pull_credit() {
        let right = LedgerOp::CompleteQuiz("q1".into()).update_document();
        assert_eq!(
            right.get_document("$addToSet").unwrap().get_str("courses.$.completedQuizzes").unwrap(),
            "q1"
        );
        let wrong = LedgerOp::UncompleteQuiz("q1".into()).update_document();
        assert_eq!(
            wrong.get_document("$pull").unwrap().get_str("courses.$.completedQuizzes").unwrap(),
            "q1"
        );
    }

    #[test]
    fn update_documents_target_positional_entry() {
        let update = LedgerOp::CompleteLesson("l1".into()).update_document();
        assert_eq!(
            update.get_document("$addToSet").unwrap().get_str("courses.$.completedLessons").unwrap(),
            "l1"
        );

        let update = LedgerOp::UncompleteLesson {
            lesson_id: "l1".into(),
            quiz_id: Some("q1".into()),
        }
        .update_document();
        let pull = update.get_document("$pull").unwrap();
        assert_eq!(pull.get_str("courses.$.completedQuizzes").unwrap(), "q1");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(Enrollment::new("c1")).unwrap();
        assert_eq!(json["courseId"], "c1");
        assert!(json["completedLessons"].as_array().unwrap().is_empty());
    }
}
