use serde::{Deserialize, Serialize};

use crate::models::course::{Course, CourseDraft, CourseStatus, Lesson, MediaRef, Quiz, Section};

/// Frozen, publicly served copy of a course, produced only by admin approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedCourse {
    pub course_id: String,
    pub instructor: String,
    pub approved_at: i64,
    pub content: CourseDraft,
}

impl PublishedCourse {
    pub fn promote(course: &Course, now: i64) -> Self {
        Self {
            course_id: course.id.clone(),
            instructor: course.instructor.clone(),
            approved_at: now,
            content: course.draft.clone(),
        }
    }

    pub fn is_free(&self) -> bool {
        !self.content.paid || self.content.price <= 0.0
    }

    pub fn lesson(&self, lesson_id: &str) -> Option<&Lesson> {
        self.content.lessons.iter().find(|l| l.id == lesson_id)
    }

    pub fn quiz(&self, quiz_id: &str) -> Option<&Quiz> {
        self.content.quizzes.iter().find(|q| q.id == quiz_id)
    }

    pub fn quiz_for_lesson(&self, lesson_id: &str) -> Option<&Quiz> {
        self.content.quizzes.iter().find(|q| q.lesson == lesson_id)
    }
}

/// A lesson's section, resolved within the lesson's own scope when possible.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SectionRef {
    Resolved(Section),
    Unresolved(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonView {
    #[serde(rename = "_id")]
    pub id: String,
    pub index: i32,
    pub section: SectionRef,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub document_link: Option<MediaRef>,
    pub video_link: Option<MediaRef>,
    pub duration: f64,
    pub free_preview: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentView {
    pub name: String,
    pub slug: String,
    pub category: String,
    pub summary: String,
    pub description: String,
    pub goal: Vec<String>,
    pub requirements: Vec<String>,
    pub tags: Vec<String>,
    pub languages: Vec<String>,
    pub image: Option<MediaRef>,
    pub price: f64,
    pub paid: bool,
    pub sections: Vec<Section>,
    pub lessons: Vec<LessonView>,
    pub quizzes: Vec<Quiz>,
    pub total_duration: f64,
}

impl CourseDraft {
    pub fn total_duration(&self) -> f64 {
        self.lessons.iter().map(|l| l.duration).sum()
    }

    pub fn resolved_lessons(&self) -> Vec<LessonView> {
        self.lessons
            .iter()
            .map(|lesson| LessonView {
                id: lesson.id.clone(),
                index: lesson.index,
                section: self
                    .sections
                    .iter()
                    .find(|s| s.id == lesson.section)
                    .cloned()
                    .map(SectionRef::Resolved)
                    .unwrap_or_else(|| SectionRef::Unresolved(lesson.section.clone())),
                title: lesson.title.clone(),
                slug: lesson.slug.clone(),
                content: lesson.content.clone(),
                document_link: lesson.document_link.clone(),
                video_link: lesson.video_link.clone(),
                duration: lesson.duration,
                free_preview: lesson.free_preview,
            })
            .collect()
    }

    pub fn project(&self) -> ContentView {
        ContentView {
            name: self.name.clone(),
            slug: self.slug.clone(),
            category: self.category.clone(),
            summary: self.summary.clone(),
            description: self.description.clone(),
            goal: self.goal.clone(),
            requirements: self.requirements.clone(),
            tags: self.tags.clone(),
            languages: self.languages.clone(),
            image: self.image.clone(),
            price: self.price,
            paid: self.paid,
            sections: self.sections.clone(),
            lessons: self.resolved_lessons(),
            quizzes: self.quizzes.clone(),
            total_duration: self.total_duration(),
        }
    }
}

/// Instructor/admin view: the live draft, with the snapshot alongside.
#[derive(Debug, Clone, Serialize)]
pub struct DraftCourseView {
    #[serde(rename = "_id")]
    pub id: String,
    pub instructor: String,
    pub status: CourseStatus,
    pub published: bool,
    pub rejected_reasons: Vec<String>,
    pub revision: i64,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
    #[serde(flatten)]
    pub content: ContentView,
    pub official_data: Option<ContentView>,
}

impl From<&Course> for DraftCourseView {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id.clone(),
            instructor: course.instructor.clone(),
            status: course.status,
            published: course.published,
            rejected_reasons: course.rejected_reasons.clone(),
            revision: course.revision,
            created_at: course.created_at,
            updated_at: course.updated_at,
            content: course.draft.project(),
            official_data: course
                .official_data
                .as_ref()
                .map(|snapshot| snapshot.content.project()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub picture: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// Public read model; built from `official_data` only.
#[derive(Debug, Clone, Serialize)]
pub struct PublicCourseView {
    #[serde(rename = "_id")]
    pub id: String,
    pub instructor: Option<UserSummary>,
    pub category_info: Option<CategorySummary>,
    pub rating: f64,
    pub review_count: u64,
    pub approved_at: i64,
    #[serde(flatten)]
    pub content: ContentView,
}

impl PublicCourseView {
    pub fn build(
        snapshot: &PublishedCourse,
        instructor: Option<UserSummary>,
        category_info: Option<CategorySummary>,
        rating: f64,
        review_count: u64,
    ) -> Self {
        Self {
            id: snapshot.course_id.clone(),
            instructor,
            category_info,
            rating,
            review_count,
            approved_at: snapshot.approved_at,
            content: snapshot.content.project(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicSort {
    Star,
    Duration,
    Price,
    Name,
    Newest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCourseQuery {
    pub category: Option<String>,
    pub name: Option<String>,
    /// Minimum total lesson duration.
    pub duration: Option<f64>,
    pub lower_price: Option<f64>,
    pub upper_price: Option<f64>,
    pub sort_by: Option<PublicSort>,
    /// 1 ascending, -1 descending.
    pub sort_by_mode: Option<i32>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PublicCourseQuery {
    pub const DEFAULT_LIMIT: u64 = 14;

    /// Orders already-fetched views in place.
    pub fn sort(&self, views: &mut [PublicCourseView]) {
        let descending = self.sort_by_mode.unwrap_or(-1) < 0;
        let Some(sort_by) = self.sort_by else {
            views.sort_by(|a, b| b.approved_at.cmp(&a.approved_at));
            return;
        };
        views.sort_by(|a, b| {
            let ordering = match sort_by {
                PublicSort::Star => a.rating.total_cmp(&b.rating),
                PublicSort::Duration => a.content.total_duration.total_cmp(&b.content.total_duration),
                PublicSort::Price => a.content.price.total_cmp(&b.content.price),
                PublicSort::Name => a.content.name.to_lowercase().cmp(&b.content.name.to_lowercase()),
                PublicSort::Newest => a.approved_at.cmp(&b.approved_at),
            };
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

/// Average star rating truncated to one decimal.
pub fn truncate_rating(average: f64) -> f64 {
    (average * 10.0).trunc() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::course::{
        CreateCourseRequest, LessonInput, ReviewDecision, ReviewKind, SectionRequest,
    };

    fn published_with_lesson() -> Course {
        let draft = CreateCourseRequest {
            name: "Intro".into(),
            category: "cat".into(),
            summary: String::new(),
            description: "d".into(),
            goal: vec![],
            requirements: vec![],
            tags: vec![],
            languages: vec![],
            image: None,
            price: 0.0,
            paid: false,
        }
        .into_draft()
        .unwrap();
        let mut course = Course::new("u1", draft, 1);
        let section = course
            .add_section(
                SectionRequest {
                    index: 0,
                    name: "S1".into(),
                    same_index_acceptable: false,
                },
                2,
            )
            .unwrap();
        course
            .add_lesson(
                LessonInput {
                    index: 0,
                    section: section.id,
                    title: "Hello world".into(),
                    content: String::new(),
                    document_link: None,
                    video_link: None,
                    duration: 12.5,
                    free_preview: true,
                },
                3,
            )
            .unwrap();
        course.submit_for_publish(4).unwrap();
        course
            .review(ReviewKind::New, ReviewDecision::Accept, 5)
            .unwrap();
        course
    }

    #[test]
    fn snapshot_lessons_resolve_against_snapshot_sections() {
        let mut course = published_with_lesson();
        let section_id = course.draft.sections[0].id.clone();
        course
            .update_section(
                &section_id,
                SectionRequest {
                    index: 0,
                    name: "Renamed in draft".into(),
                    same_index_acceptable: true,
                },
                6,
            )
            .unwrap();

        let snapshot = course.official_data.as_ref().unwrap();
        let lessons = snapshot.content.resolved_lessons();
        match &lessons[0].section {
            SectionRef::Resolved(section) => assert_eq!(section.name, "S1"),
            other => panic!("expected resolved section, got {:?}", other),
        }

        let draft_lessons = course.draft.resolved_lessons();
        match &draft_lessons[0].section {
            SectionRef::Resolved(section) => assert_eq!(section.name, "Renamed in draft"),
            other => panic!("expected resolved section, got {:?}", other),
        }
    }

    #[test]
    fn unknown_section_stays_as_raw_id() {
        let mut course = published_with_lesson();
        course.draft.lessons[0].section = "ghost".into();
        let lessons = course.draft.resolved_lessons();
        assert_eq!(lessons[0].section, SectionRef::Unresolved("ghost".into()));

        let json = serde_json::to_value(&lessons[0]).unwrap();
        assert_eq!(json["section"], "ghost");
    }

    #[test]
    fn projection_sums_durations() {
        let course = published_with_lesson();
        let view = DraftCourseView::from(&course);
        assert_eq!(view.content.total_duration, 12.5);
        assert!(view.official_data.is_some());
    }

    #[test]
    fn rating_is_truncated_not_rounded() {
        assert_eq!(truncate_rating(4.56), 4.5);
        assert_eq!(truncate_rating(5.0), 5.0);
    }

    #[test]
    fn sorts_by_price_ascending() {
        let course = published_with_lesson();
        let snapshot = course.official_data.clone().unwrap();
        let mut cheap = PublicCourseView::build(&snapshot, None, None, 0.0, 0);
        cheap.content.price = 10.0;
        let mut pricey = PublicCourseView::build(&snapshot, None, None, 0.0, 0);
        pricey.content.price = 99.0;
        let mut views = vec![pricey, cheap];

        let query = PublicCourseQuery {
            category: None,
            name: None,
            duration: None,
            lower_price: None,
            upper_price: None,
            sort_by: Some(PublicSort::Price),
            sort_by_mode: Some(1),
            page: None,
            limit: None,
        };
        query.sort(&mut views);
        assert_eq!(views[0].content.price, 10.0);
    }
}
