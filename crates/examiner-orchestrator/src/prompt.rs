//! Examiner prompt construction.
//!
//! Prompts are rendered per call from the course name, the exam language and
//! the current position in the exam. The reply-tag contract the examiner is
//! asked to follow is parsed back by [`crate::reply`].

use crate::config::ExamLanguage;
use crate::questions::QUESTIONS_PER_EXAM;
use crate::reply::{FOLLOW_UP_TAG, NEXT_TAG};

/// Builds system prompts for answer evaluation and final grading.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    course: String,
    language: ExamLanguage,
}

impl PromptBuilder {
    /// Creates a builder for the given course and language.
    #[must_use]
    pub fn new(course: impl Into<String>, language: ExamLanguage) -> Self {
        Self {
            course: course.into(),
            language,
        }
    }

    /// Opening examiner turn that presents a question.
    ///
    /// `index` is zero-based.
    #[must_use]
    pub fn question_turn(&self, index: usize, question: &str) -> String {
        let number = index + 1;
        match self.language {
            ExamLanguage::English => {
                format!("Question {number} of {QUESTIONS_PER_EXAM}: {question}")
            }
            ExamLanguage::Ukrainian => {
                format!("Питання {number} з {QUESTIONS_PER_EXAM}: {question}")
            }
        }
    }

    /// System prompt for evaluating an answer to the current question.
    ///
    /// When `follow_up_allowed` is false the examiner is told it must move on.
    #[must_use]
    pub fn answer_prompt(&self, index: usize, question: &str, follow_up_allowed: bool) -> String {
        let number = index + 1;
        let course = &self.course;

        match self.language {
            ExamLanguage::English => {
                let follow_up = if follow_up_allowed {
                    format!(
                        "If the answer is incomplete or unclear you may ask ONE short clarifying \
                         follow-up question about the same topic; end such a reply with {FOLLOW_UP_TAG}."
                    )
                } else {
                    "You may not ask any more follow-up questions on this topic.".to_string()
                };
                format!(
                    "You are an examiner conducting an oral examination for the {course} course.\n\
                     Be professional and supportive and use appropriate academic language.\n\
                     \n\
                     The student is answering question {number} of {QUESTIONS_PER_EXAM}:\n\
                     \"{question}\"\n\
                     \n\
                     Give brief, clear feedback on the student's latest answer. Do not reveal a \
                     numeric score and do not ask about other topics.\n\
                     {follow_up}\n\
                     When you are done with this question, end your reply with {NEXT_TAG}.\n\
                     Every reply must end with exactly one of {NEXT_TAG} or {FOLLOW_UP_TAG}."
                )
            }
            ExamLanguage::Ukrainian => {
                let follow_up = if follow_up_allowed {
                    format!(
                        "Якщо відповідь неповна або незрозуміла, можете поставити ОДНЕ коротке \
                         уточнювальне питання з тієї ж теми; завершіть таку відповідь тегом {FOLLOW_UP_TAG}."
                    )
                } else {
                    "Більше уточнювальних питань з цієї теми ставити не можна.".to_string()
                };
                format!(
                    "Ви екзаменатор, який проводить усний іспит з курсу «{course}».\n\
                     Будьте професійним і доброзичливим, використовуйте академічну мову.\n\
                     \n\
                     Студент відповідає на питання {number} з {QUESTIONS_PER_EXAM}:\n\
                     «{question}»\n\
                     \n\
                     Дайте короткий чіткий відгук на останню відповідь студента. Не називайте \
                     числову оцінку і не питайте про інші теми.\n\
                     {follow_up}\n\
                     Коли закінчите з цим питанням, завершіть відповідь тегом {NEXT_TAG}.\n\
                     Кожна відповідь має закінчуватися рівно одним із тегів {NEXT_TAG} або {FOLLOW_UP_TAG}."
                )
            }
        }
    }

    /// System prompt for grading the whole examination.
    #[must_use]
    pub fn scoring_prompt(&self, questions: &[String]) -> String {
        let course = &self.course;
        let listed = questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}. {q}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        match self.language {
            ExamLanguage::English => format!(
                "You are an examiner grading an oral examination for the {course} course.\n\
                 The student was asked these questions:\n\
                 {listed}\n\
                 \n\
                 Read the full transcript, give short final feedback on each answer, then \
                 state the overall result on its own last line exactly as `Score: N` where N \
                 is a number from 0 to 10."
            ),
            ExamLanguage::Ukrainian => format!(
                "Ви екзаменатор, який оцінює усний іспит з курсу «{course}».\n\
                 Студенту поставили такі питання:\n\
                 {listed}\n\
                 \n\
                 Прочитайте весь діалог, дайте короткий підсумковий відгук на кожну відповідь, \
                 а потім в останньому окремому рядку вкажіть загальний результат точно у \
                 форматі `Score: N`, де N це число від 0 до 10."
            ),
        }
    }

    /// Final user message that asks the oracle for the grade.
    #[must_use]
    pub const fn scoring_request(&self) -> &'static str {
        match self.language {
            ExamLanguage::English => {
                "The examination is over. Please give your final assessment and score."
            }
            ExamLanguage::Ukrainian => {
                "Іспит завершено. Будь ласка, дайте підсумкову оцінку та бал."
            }
        }
    }

    /// Examiner text stored when the oracle reply was only a tag.
    #[must_use]
    pub const fn empty_reply_placeholder(&self) -> &'static str {
        match self.language {
            ExamLanguage::English => "(no feedback)",
            ExamLanguage::Ukrainian => "(без відгуку)",
        }
    }
}
