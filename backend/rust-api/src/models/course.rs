use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::published::PublishedCourse;
use crate::models::{new_id, PageQuery};
use crate::utils::slug::slugify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    /// Editable draft, not under review.
    Unpublic,
    /// Submitted and frozen until an admin decides.
    Unaccepted,
    Rejected,
    /// The last approved snapshot is being served and the draft matches it.
    Public,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Unpublic => "unpublic",
            CourseStatus::Unaccepted => "unaccepted",
            CourseStatus::Rejected => "rejected",
            CourseStatus::Public => "public",
        }
    }

    pub fn can_transition_to(&self, next: CourseStatus) -> bool {
        matches!(
            (self, next),
            (
                CourseStatus::Unpublic | CourseStatus::Rejected | CourseStatus::Public,
                CourseStatus::Unaccepted
            ) | (
                CourseStatus::Unaccepted,
                CourseStatus::Unpublic | CourseStatus::Public | CourseStatus::Rejected
            ) | (
                CourseStatus::Rejected | CourseStatus::Public,
                CourseStatus::Unpublic
            )
        )
    }
}

impl FromStr for CourseStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "unpublic" => Ok(CourseStatus::Unpublic),
            "unaccepted" => Ok(CourseStatus::Unaccepted),
            "rejected" => Ok(CourseStatus::Rejected),
            "public" => Ok(CourseStatus::Public),
            _ => Err(format!("Invalid course status: {}", value)),
        }
    }
}

/// Uploaded object, shaped like the storage provider's upload response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaRef {
    #[serde(default)]
    pub bucket: String,
    pub key: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "_id")]
    pub id: String,
    pub index: i32,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: String,
    pub index: i32,
    /// Id of a section in the same scope.
    pub section: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub content: String,
    pub document_link: Option<MediaRef>,
    pub video_link: Option<MediaRef>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub free_preview: bool,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub index: i32,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectMark {
    pub index: i32,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(rename = "_id")]
    pub id: String,
    pub lesson: String,
    pub question: String,
    pub answer: Vec<AnswerOption>,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: Vec<CorrectMark>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

impl Quiz {
    /// Index of the first option marked correct.
    pub fn correct_index(&self) -> Option<i32> {
        self.correct_answer
            .iter()
            .find(|mark| mark.value)
            .map(|mark| mark.index)
    }
}

/// The authorable content of a course. Both the live draft and every
/// published snapshot hold one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDraft {
    pub name: String,
    pub slug: String,
    pub category: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub goal: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub image: Option<MediaRef>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
}

/// Persisted course aggregate: live draft plus the last approved snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    pub instructor: String,
    pub draft: CourseDraft,
    pub status: CourseStatus,
    pub published: bool,
    #[serde(default)]
    pub rejected_reasons: Vec<String>,
    pub official_data: Option<PublishedCourse>,
    /// Bumped on every write; used for compare-and-swap updates.
    #[serde(default)]
    pub revision: i64,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewKind {
    /// First publish of a course that has never been public.
    New,
    /// Re-review of edits to an already published course.
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    Reject(Vec<String>),
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 3, max = 320, message = "Name must be 3-320 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[validate(length(max = 400))]
    #[serde(default)]
    pub summary: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[serde(default)]
    pub goal: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub image: Option<MediaRef>,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub paid: bool,
}

impl CreateCourseRequest {
    pub fn into_draft(self) -> AppResult<CourseDraft> {
        let slug = slugify(&self.name);
        if slug.is_empty() {
            return Err(AppError::Validation(
                "Name must contain letters or digits".to_string(),
            ));
        }
        Ok(CourseDraft {
            name: self.name.trim().to_string(),
            slug,
            category: self.category,
            summary: self.summary,
            description: self.description,
            goal: self.goal,
            requirements: self.requirements,
            tags: self.tags,
            languages: self.languages,
            image: self.image,
            price: self.price,
            paid: self.paid,
            sections: Vec::new(),
            lessons: Vec::new(),
            quizzes: Vec::new(),
        })
    }
}

/// Top-level fields an instructor may change on a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseField {
    Name,
    Summary,
    Image,
    Description,
    Category,
    Tags,
    Paid,
    Price,
    Requirements,
    Goal,
    Languages,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CoursePatch {
    #[validate(length(min = 3, max = 320))]
    pub name: Option<String>,
    #[validate(length(max = 400))]
    pub summary: Option<String>,
    pub image: Option<MediaRef>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub paid: Option<bool>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    pub requirements: Option<Vec<String>>,
    pub goal: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
}

/// Fields of a patch that differ from the live draft and from the published snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    pub vs_draft: Vec<CourseField>,
    pub vs_official: Vec<CourseField>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.vs_draft.is_empty() && self.vs_official.is_empty()
    }

    pub fn diverges_from_official(&self) -> bool {
        !self.vs_official.is_empty()
    }
}

impl CoursePatch {
    /// Structural comparison of every provided field. Without a snapshot,
    /// every provided field counts as diverging from it.
    pub fn diff(&self, draft: &CourseDraft, official: Option<&CourseDraft>) -> ChangeSet {
        let mut changes = ChangeSet::default();

        macro_rules! compare {
            ($field:ident, $variant:expr) => {
                if let Some(value) = &self.$field {
                    if *value != draft.$field {
                        changes.vs_draft.push($variant);
                    }
                    if official.map_or(true, |snapshot| *value != snapshot.$field) {
                        changes.vs_official.push($variant);
                    }
                }
            };
        }

        compare!(name, CourseField::Name);
        compare!(summary, CourseField::Summary);
        if let Some(image) = &self.image {
            if draft.image.as_ref() != Some(image) {
                changes.vs_draft.push(CourseField::Image);
            }
            if official.map_or(true, |snapshot| snapshot.image.as_ref() != Some(image)) {
                changes.vs_official.push(CourseField::Image);
            }
        }
        compare!(description, CourseField::Description);
        compare!(category, CourseField::Category);
        compare!(tags, CourseField::Tags);
        compare!(paid, CourseField::Paid);
        compare!(price, CourseField::Price);
        compare!(requirements, CourseField::Requirements);
        compare!(goal, CourseField::Goal);
        compare!(languages, CourseField::Languages);

        changes
    }

    fn apply_to(self, draft: &mut CourseDraft) {
        if let Some(name) = self.name {
            draft.slug = slugify(&name);
            draft.name = name;
        }
        if let Some(summary) = self.summary {
            draft.summary = summary;
        }
        if let Some(image) = self.image {
            draft.image = Some(image);
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(category) = self.category {
            draft.category = category;
        }
        if let Some(tags) = self.tags {
            draft.tags = tags;
        }
        if let Some(paid) = self.paid {
            draft.paid = paid;
        }
        if let Some(price) = self.price {
            draft.price = price;
        }
        if let Some(requirements) = self.requirements {
            draft.requirements = requirements;
        }
        if let Some(goal) = self.goal {
            draft.goal = goal;
        }
        if let Some(languages) = self.languages {
            draft.languages = languages;
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SectionRequest {
    #[validate(range(min = 0))]
    pub index: i32,
    #[validate(length(min = 1, max = 320))]
    pub name: String,
    #[serde(default, rename = "sameIndexAcceptable")]
    pub same_index_acceptable: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LessonInput {
    #[validate(range(min = 0))]
    pub index: i32,
    pub section: String,
    #[validate(length(min = 3, max = 500))]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub document_link: Option<MediaRef>,
    pub video_link: Option<MediaRef>,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub free_preview: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LessonUpdateRequest {
    #[validate(nested)]
    pub lesson: LessonInput,
    #[serde(default, rename = "sameIndexAcceptable")]
    pub same_index_acceptable: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuizInput {
    #[validate(length(min = 1))]
    pub question: String,
    #[validate(length(min = 2, message = "A quiz needs at least two answers"))]
    pub answer: Vec<AnswerOption>,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: Vec<CorrectMark>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuizRequest {
    #[validate(nested)]
    pub quiz: QuizInput,
}

impl QuizInput {
    fn check_correct_marker(&self) -> AppResult<()> {
        let marked = self.correct_answer.iter().find(|mark| mark.value);
        match marked {
            Some(mark) if self.answer.iter().any(|option| option.index == mark.index) => Ok(()),
            Some(_) => Err(AppError::Validation(
                "Correct answer refers to an unknown option".to_string(),
            )),
            None => Err(AppError::Validation(
                "Quiz must mark one answer as correct".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    #[serde(rename = "isAccepted")]
    pub is_accepted: bool,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl ReviewRequest {
    pub fn into_decision(self) -> AppResult<ReviewDecision> {
        if self.is_accepted {
            return Ok(ReviewDecision::Accept);
        }
        let reasons: Vec<String> = self
            .reasons
            .into_iter()
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty())
            .collect();
        if reasons.is_empty() {
            return Err(AppError::Validation(
                "Rejecting a course requires at least one reason".to_string(),
            ));
        }
        Ok(ReviewDecision::Reject(reasons))
    }
}

/// Base64 data URL posted by the course editor.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaUploadRequest {
    #[serde(alias = "image", alias = "pdf")]
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaRemoveRequest {
    #[serde(alias = "Key")]
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstructorCourseQuery {
    pub published: Option<bool>,
    pub status: Option<String>,
    pub name: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl InstructorCourseQuery {
    pub fn paging(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectQuery {
    /// `new` for never-published submissions, `edit` for re-reviews.
    #[serde(rename = "type")]
    pub kind: Option<ReviewKind>,
    pub name: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl InspectQuery {
    pub fn paging(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate behaviour
// ---------------------------------------------------------------------------

impl Course {
    pub fn new(instructor: &str, draft: CourseDraft, now: i64) -> Self {
        Self {
            id: new_id(),
            instructor: instructor.to_string(),
            draft,
            status: CourseStatus::Unpublic,
            published: false,
            rejected_reasons: Vec::new(),
            official_data: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ensure_owner(&self, user_id: &str) -> AppResult<()> {
        if self.instructor != user_id {
            return Err(AppError::Forbidden(
                "You are not the instructor of this course".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ensure_editable(&self) -> AppResult<()> {
        if self.status == CourseStatus::Unaccepted {
            return Err(AppError::InvalidState(
                "Course is pending review and cannot be edited".to_string(),
            ));
        }
        Ok(())
    }

    /// Drops back to `unpublic`; rejection reasons only describe the draft that was reviewed.
    fn mark_edited(&mut self, now: i64) {
        self.status = CourseStatus::Unpublic;
        self.rejected_reasons.clear();
        self.updated_at = now;
    }

    pub fn apply_patch(&mut self, patch: CoursePatch, now: i64) -> AppResult<ChangeSet> {
        self.ensure_editable()?;
        if let Some(name) = &patch.name {
            if slugify(name).is_empty() {
                return Err(AppError::Validation(
                    "Name must contain letters or digits".to_string(),
                ));
            }
        }

        let official = self.official_data.as_ref().map(|snapshot| &snapshot.content);
        let changes = patch.diff(&self.draft, official);
        if changes.is_empty() {
            return Err(AppError::NoChange);
        }

        patch.apply_to(&mut self.draft);
        if changes.diverges_from_official() || self.status == CourseStatus::Rejected {
            self.mark_edited(now);
        } else {
            self.updated_at = now;
        }
        Ok(changes)
    }

    // -- sections ----------------------------------------------------------

    pub fn add_section(&mut self, req: SectionRequest, now: i64) -> AppResult<Section> {
        self.ensure_editable()?;
        if self.draft.sections.iter().any(|s| s.index == req.index) {
            return Err(AppError::Conflict(
                "Section index already exists in this course".to_string(),
            ));
        }
        let section = Section {
            id: new_id(),
            index: req.index,
            name: req.name.trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.draft.sections.push(section.clone());
        self.mark_edited(now);
        Ok(section)
    }

    pub fn update_section(
        &mut self,
        section_id: &str,
        req: SectionRequest,
        now: i64,
    ) -> AppResult<Section> {
        self.ensure_editable()?;
        let position = self
            .draft
            .sections
            .iter()
            .position(|s| s.id == section_id)
            .ok_or_else(|| AppError::not_found("Section"))?;

        let name = req.name.trim().to_string();
        let current = &self.draft.sections[position];
        if current.index == req.index && current.name == name {
            return Err(AppError::NoChange);
        }
        if !req.same_index_acceptable
            && self
                .draft
                .sections
                .iter()
                .any(|s| s.id != section_id && s.index == req.index)
        {
            return Err(AppError::Conflict(
                "Section index already exists in this course".to_string(),
            ));
        }

        let section = &mut self.draft.sections[position];
        section.index = req.index;
        section.name = name;
        section.updated_at = now;
        let updated = section.clone();
        self.mark_edited(now);
        Ok(updated)
    }

    pub fn delete_section(&mut self, section_id: &str, now: i64) -> AppResult<()> {
        self.ensure_editable()?;
        if !self.draft.sections.iter().any(|s| s.id == section_id) {
            return Err(AppError::not_found("Section"));
        }
        if self.draft.lessons.iter().any(|l| l.section == section_id) {
            return Err(AppError::InvalidState(
                "Section still has lessons; delete them first".to_string(),
            ));
        }
        self.draft.sections.retain(|s| s.id != section_id);
        self.mark_edited(now);
        Ok(())
    }

    // -- lessons -----------------------------------------------------------

    fn lesson_index_taken(&self, section: &str, index: i32, except: Option<&str>) -> bool {
        self.draft
            .lessons
            .iter()
            .any(|l| l.section == section && l.index == index && Some(l.id.as_str()) != except)
    }

    fn ensure_section_exists(&self, section_id: &str) -> AppResult<()> {
        if self.draft.sections.iter().any(|s| s.id == section_id) {
            Ok(())
        } else {
            Err(AppError::not_found("Section"))
        }
    }

    pub fn add_lesson(&mut self, input: LessonInput, now: i64) -> AppResult<Lesson> {
        self.ensure_editable()?;
        self.ensure_section_exists(&input.section)?;
        if self.lesson_index_taken(&input.section, input.index, None) {
            return Err(AppError::Conflict(
                "Index is taken, please choose another one".to_string(),
            ));
        }

        let lesson = Lesson {
            id: new_id(),
            index: input.index,
            section: input.section,
            slug: slugify(&input.title),
            title: input.title.trim().to_string(),
            content: input.content,
            document_link: input.document_link,
            video_link: input.video_link,
            duration: input.duration,
            free_preview: input.free_preview,
            created_at: now,
            updated_at: now,
        };
        self.draft.lessons.push(lesson.clone());
        self.mark_edited(now);
        Ok(lesson)
    }

    pub fn update_lesson(
        &mut self,
        lesson_id: &str,
        req: LessonUpdateRequest,
        now: i64,
    ) -> AppResult<Lesson> {
        self.ensure_editable()?;
        let position = self
            .draft
            .lessons
            .iter()
            .position(|l| l.id == lesson_id)
            .ok_or_else(|| AppError::not_found("Lesson"))?;
        let input = req.lesson;
        self.ensure_section_exists(&input.section)?;

        let current = &self.draft.lessons[position];
        let title = input.title.trim().to_string();
        let unchanged = current.index == input.index
            && current.section == input.section
            && current.title == title
            && current.content == input.content
            && current.document_link == input.document_link
            && current.video_link == input.video_link
            && current.duration == input.duration
            && current.free_preview == input.free_preview;
        if unchanged {
            return Err(AppError::NoChange);
        }
        if !req.same_index_acceptable
            && self.lesson_index_taken(&input.section, input.index, Some(lesson_id))
        {
            return Err(AppError::Conflict(
                "Index is taken, please choose another one".to_string(),
            ));
        }

        let lesson = &mut self.draft.lessons[position];
        lesson.index = input.index;
        lesson.section = input.section;
        lesson.slug = slugify(&title);
        lesson.title = title;
        lesson.content = input.content;
        lesson.document_link = input.document_link;
        lesson.video_link = input.video_link;
        lesson.duration = input.duration;
        lesson.free_preview = input.free_preview;
        lesson.updated_at = now;
        let updated = lesson.clone();
        self.mark_edited(now);
        Ok(updated)
    }

    /// Removes the lesson together with its quiz.
    pub fn delete_lesson(&mut self, lesson_id: &str, now: i64) -> AppResult<()> {
        self.ensure_editable()?;
        if !self.draft.lessons.iter().any(|l| l.id == lesson_id) {
            return Err(AppError::not_found("Lesson"));
        }
        self.draft.lessons.retain(|l| l.id != lesson_id);
        self.draft.quizzes.retain(|q| q.lesson != lesson_id);
        self.mark_edited(now);
        Ok(())
    }

    // -- quizzes -----------------------------------------------------------

    pub fn add_quiz(&mut self, lesson_id: &str, input: QuizInput, now: i64) -> AppResult<Quiz> {
        self.ensure_editable()?;
        if !self.draft.lessons.iter().any(|l| l.id == lesson_id) {
            return Err(AppError::not_found("Lesson"));
        }
        if self.draft.quizzes.iter().any(|q| q.lesson == lesson_id) {
            return Err(AppError::Conflict(
                "Current lesson already has a quiz, try updating or deleting it instead"
                    .to_string(),
            ));
        }
        input.check_correct_marker()?;

        let quiz = Quiz {
            id: new_id(),
            lesson: lesson_id.to_string(),
            question: input.question,
            answer: input.answer,
            correct_answer: input.correct_answer,
            created_at: now,
            updated_at: now,
        };
        self.draft.quizzes.push(quiz.clone());
        self.mark_edited(now);
        Ok(quiz)
    }

    pub fn update_quiz(
        &mut self,
        lesson_id: &str,
        quiz_id: &str,
        input: QuizInput,
        now: i64,
    ) -> AppResult<Quiz> {
        self.ensure_editable()?;
        let quiz = self
            .draft
            .quizzes
            .iter_mut()
            .find(|q| q.id == quiz_id && q.lesson == lesson_id)
            .ok_or_else(|| AppError::not_found("Quiz"))?;

        if quiz.question == input.question
            && quiz.answer == input.answer
            && quiz.correct_answer == input.correct_answer
        {
            return Err(AppError::NoChange);
        }
        input.check_correct_marker()?;

        quiz.question = input.question;
        quiz.answer = input.answer;
        quiz.correct_answer = input.correct_answer;
        quiz.updated_at = now;
        let updated = quiz.clone();
        self.mark_edited(now);
        Ok(updated)
    }

    pub fn delete_quiz(&mut self, lesson_id: &str, quiz_id: &str, now: i64) -> AppResult<()> {
        self.ensure_editable()?;
        let before = self.draft.quizzes.len();
        self.draft
            .quizzes
            .retain(|q| !(q.id == quiz_id && q.lesson == lesson_id));
        if self.draft.quizzes.len() == before {
            return Err(AppError::not_found("Quiz"));
        }
        self.mark_edited(now);
        Ok(())
    }

    // -- publish workflow --------------------------------------------------

    pub fn submit_for_publish(&mut self, now: i64) -> AppResult<()> {
        if !self.status.can_transition_to(CourseStatus::Unaccepted) {
            return Err(AppError::InvalidState(format!(
                "Course cannot be submitted while {}",
                self.status.as_str()
            )));
        }
        self.status = CourseStatus::Unaccepted;
        self.updated_at = now;
        Ok(())
    }

    pub fn undo_submit(&mut self, now: i64) -> AppResult<()> {
        if self.status != CourseStatus::Unaccepted {
            return Err(AppError::InvalidState(
                "Course is not awaiting review".to_string(),
            ));
        }
        self.status = CourseStatus::Unpublic;
        self.updated_at = now;
        Ok(())
    }

    pub fn review(&mut self, kind: ReviewKind, decision: ReviewDecision, now: i64) -> AppResult<()> {
        if self.status != CourseStatus::Unaccepted {
            return Err(AppError::InvalidState(
                "Course is not awaiting review".to_string(),
            ));
        }
        match (kind, self.published) {
            (ReviewKind::New, true) => {
                return Err(AppError::InvalidState(
                    "Course is already published; review it as an edit".to_string(),
                ))
            }
            (ReviewKind::Edit, false) => {
                return Err(AppError::InvalidState(
                    "Course has never been published; review it as new".to_string(),
                ))
            }
            _ => {}
        }

        match decision {
            ReviewDecision::Accept => {
                self.official_data = Some(PublishedCourse::promote(self, now));
                self.published = true;
                self.status = CourseStatus::Public;
                self.rejected_reasons.clear();
            }
            ReviewDecision::Reject(reasons) => {
                self.status = CourseStatus::Rejected;
                self.rejected_reasons = reasons;
            }
        }
        self.updated_at = now;
        Ok(())
    }
}
