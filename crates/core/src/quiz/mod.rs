//! Multiple-choice quiz generation from study material.

pub mod parser;
pub mod prompt;
pub mod repository;

pub use parser::{parse_quiz, BlockRejection, ParsedBlock};
pub use prompt::QuizPromptBuilder;
pub use repository::{JsonQuizRepository, QuizRepository};

use crate::error::QuizError;
use crate::extractor::PdfExtractor;
use crate::models::{Difficulty, Quiz};
use crate::traits::LanguageModel;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct QuizRequest {
    pub title: String,
    pub description: String,
    pub material: String,
    pub difficulty: Difficulty,
}

/// Prompts the model for questions and persists the quiz. A quiz that fails
/// after its shell was created is deleted again, so callers never observe a
/// quiz without questions.
pub struct QuizGenerator<M: ?Sized, R: ?Sized> {
    model: Arc<M>,
    repository: Arc<R>,
    prompts: QuizPromptBuilder,
}

impl<M, R> QuizGenerator<M, R>
where
    M: LanguageModel + ?Sized,
    R: QuizRepository + ?Sized,
{
    pub fn new(model: Arc<M>, repository: Arc<R>, prompts: QuizPromptBuilder) -> Self {
        Self {
            model,
            repository,
            prompts,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub async fn generate_quiz(&self, request: QuizRequest) -> Result<Quiz, QuizError> {
        let shell = self
            .repository
            .create_shell(&request.title, &request.description, request.difficulty)
            .await?;

        match self.fill(&shell, &request).await {
            Ok(quiz) => {
                info!(
                    quiz = %quiz.id,
                    difficulty = %quiz.difficulty,
                    questions = quiz.questions.len(),
                    "quiz generated"
                );
                Ok(quiz)
            }
            Err(error) => {
                if let Err(cleanup) = self.repository.delete(shell.id).await {
                    warn!(quiz = %shell.id, error = %cleanup, "failed to delete quiz shell");
                }
                Err(error)
            }
        }
    }

    async fn fill(&self, shell: &Quiz, request: &QuizRequest) -> Result<Quiz, QuizError> {
        let profile = self.prompts.profile(request.difficulty);
        let prompt = self.prompts.build(&request.material, request.difficulty);

        let reply = self
            .model
            .complete(&prompt)
            .await
            .map_err(QuizError::ModelCall)?;

        let questions = parse_quiz(&reply, request.difficulty, profile.answer_count)
            .map_err(QuizError::Parse)?;
        if questions.len() < profile.question_count {
            warn!(
                requested = profile.question_count,
                parsed = questions.len(),
                "model returned fewer valid questions than requested"
            );
        }

        Ok(self.repository.attach_questions(shell.id, questions).await?)
    }

    /// Extracts the PDF text and generates a quiz from it. Extraction happens
    /// before any quiz is created.
    pub async fn generate_quiz_from_pdf<X>(
        &self,
        extractor: &X,
        path: &Path,
        title: &str,
        description: &str,
        difficulty: Difficulty,
    ) -> Result<Quiz, QuizError>
    where
        X: PdfExtractor + ?Sized,
    {
        let material = extractor
            .extract_text(path)
            .await
            .map_err(QuizError::Extraction)?;

        self.generate_quiz(QuizRequest {
            title: title.to_string(),
            description: description.to_string(),
            material,
            difficulty,
        })
        .await
    }
}
