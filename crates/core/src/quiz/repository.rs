use crate::error::RepositoryError;
use crate::models::{Difficulty, Question, Quiz};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// Persistence for quizzes. A quiz is first created as an empty shell, then
/// filled with its questions once generation succeeds.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn create_shell(
        &self,
        title: &str,
        description: &str,
        difficulty: Difficulty,
    ) -> Result<Quiz, RepositoryError>;

    async fn attach_questions(
        &self,
        id: Uuid,
        questions: Vec<Question>,
    ) -> Result<Quiz, RepositoryError>;

    /// Deleting an unknown id is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;

    async fn load(&self, id: Uuid) -> Result<Option<Quiz>, RepositoryError>;

    async fn list(&self) -> Result<Vec<Quiz>, RepositoryError>;
}

/// Stores each quiz as `{id}.json` under one directory.
pub struct JsonQuizRepository {
    root: PathBuf,
}

impl JsonQuizRepository {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn quiz_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    async fn write(&self, quiz: &Quiz) -> Result<(), RepositoryError> {
        let path = self.quiz_path(quiz.id);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, serde_json::to_vec_pretty(quiz)?).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl QuizRepository for JsonQuizRepository {
    async fn create_shell(
        &self,
        title: &str,
        description: &str,
        difficulty: Difficulty,
    ) -> Result<Quiz, RepositoryError> {
        let quiz = Quiz {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            difficulty,
            created_at: Utc::now(),
            questions: Vec::new(),
        };
        self.write(&quiz).await?;
        debug!(quiz = %quiz.id, "created quiz shell");
        Ok(quiz)
    }

    async fn attach_questions(
        &self,
        id: Uuid,
        questions: Vec<Question>,
    ) -> Result<Quiz, RepositoryError> {
        let mut quiz = self.load(id).await?.ok_or(RepositoryError::NotFound(id))?;
        quiz.questions.extend(questions);
        self.write(&quiz).await?;
        Ok(quiz)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        match tokio::fs::remove_file(self.quiz_path(id)).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn load(&self, id: Uuid) -> Result<Option<Quiz>, RepositoryError> {
        match tokio::fs::read(self.quiz_path(id)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn list(&self) -> Result<Vec<Quiz>, RepositoryError> {
        let mut quizzes = Vec::new();
        let mut listing = tokio::fs::read_dir(&self.root).await?;
        while let Some(item) = listing.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let raw = tokio::fs::read(&path).await?;
            quizzes.push(serde_json::from_slice::<Quiz>(&raw)?);
        }
        quizzes.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(quizzes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Answer;

    fn question(text: &str) -> Question {
        Question {
            text: text.to_string(),
            difficulty: Difficulty::Easy,
            answers: vec![
                Answer {
                    text: "yes".to_string(),
                    is_correct: true,
                },
                Answer {
                    text: "no".to_string(),
                    is_correct: false,
                },
            ],
        }
    }

    #[tokio::test]
    async fn shell_then_questions_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let repository = JsonQuizRepository::open(dir.path()).await?;

        let shell = repository
            .create_shell("Biology", "Chapter 3", Difficulty::Easy)
            .await?;
        assert!(shell.questions.is_empty());

        let filled = repository
            .attach_questions(shell.id, vec![question("Is a cell alive?")])
            .await?;
        assert_eq!(filled.questions.len(), 1);

        let reopened = JsonQuizRepository::open(dir.path()).await?;
        assert_eq!(reopened.load(shell.id).await?, Some(filled));
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_quiz_and_ignores_unknown_ids() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempfile::tempdir()?;
        let repository = JsonQuizRepository::open(dir.path()).await?;
        let shell = repository
            .create_shell("History", "", Difficulty::Hard)
            .await?;

        repository.delete(shell.id).await?;
        repository.delete(Uuid::new_v4()).await?;

        assert_eq!(repository.load(shell.id).await?, None);
        assert!(repository.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn attaching_to_missing_quiz_fails() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let repository = JsonQuizRepository::open(dir.path()).await?;
        let missing = Uuid::new_v4();

        let result = repository.attach_questions(missing, Vec::new()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(id)) if id == missing));
        Ok(())
    }
}
