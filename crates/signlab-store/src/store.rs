//! SQLite-backed persistence for accounts, progress and results.
//!
//! Writes happen on a single connection; callers that share a `Store`
//! across threads wrap it in a mutex. Time always comes from the caller.

use crate::models::{
    round1, Achievement, Activity, DailyGoal, LanguageProgress, LanguageStats, LeaderboardEntry, LeaderboardMetric,
    Profile, ProfileUpdate, ProgressUpdate, QuizResultRow, SignAttempt, User, UserStats,
};
use crate::password;
use crate::schema::SCHEMA;
use crate::StoreError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use signlab_core::challenge::ChallengeResult;
use signlab_core::language::DEFAULT_LANGUAGE;
use signlab_core::progress::{self, PracticeSession};
use signlab_core::quiz::QuizResults;
use signlab_core::scoring::SkillLevel;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Activity types that count toward the practice streak.
pub const ACTIVITY_PRACTICE: &str = "practice_session";
pub const ACTIVITY_QUIZ: &str = "quiz_completed";

const MIN_PASSWORD_LEN: usize = 6;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        let store = Self::init(conn)?;
        tracing::info!(path = %path.display(), "database opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // --- accounts ---

    /// Register a user with the default profile and an empty progress row
    /// for the default language. Returns the new user id.
    pub fn create_user(
        &mut self,
        email: &str,
        password: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let email = email.trim().to_ascii_lowercase();
        if !email.contains('@') {
            return Err(StoreError::Invalid(format!("not an email address: {email}")));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(StoreError::Invalid(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if name.trim().is_empty() {
            return Err(StoreError::Invalid("name must not be empty".into()));
        }

        let tx = self.conn.transaction()?;
        let exists: bool = tx.query_row("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)", [&email], |r| {
            r.get(0)
        })?;
        if exists {
            return Err(StoreError::EmailTaken(email));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let profile = serde_json::to_string(&Profile::default())?;
        let password_hash = password::hash(password)?;
        tx.execute(
            "INSERT INTO users (id, email, password_hash, name, created_at, profile_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, email, password_hash, name.trim(), now, profile],
        )?;
        tx.execute(
            "INSERT INTO user_progress (user_id, language, last_updated) VALUES (?1, ?2, ?3)",
            params![id, DEFAULT_LANGUAGE, now],
        )?;
        tx.commit()?;

        tracing::info!(user = %id, "user created");
        Ok(id)
    }

    /// Check credentials and stamp `last_login`. Unknown, inactive or
    /// mismatched accounts all yield `None`.
    pub fn authenticate(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<Option<User>, StoreError> {
        let email = email.trim().to_ascii_lowercase();
        let row: Option<(String, String, bool)> = self
            .conn
            .query_row(
                "SELECT id, password_hash, is_active FROM users WHERE email = ?1",
                [&email],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        let Some((id, stored, active)) = row else {
            return Ok(None);
        };
        if !active || !password::verify(password, &stored) {
            tracing::debug!(user = %id, active, "authentication rejected");
            return Ok(None);
        }

        self.conn
            .execute("UPDATE users SET last_login = ?1 WHERE id = ?2", params![now, id])?;
        self.user(&id)
    }

    pub fn user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, email, name, created_at, last_login, is_active, profile_data FROM users WHERE id = ?1",
                [user_id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, DateTime<Utc>>(3)?,
                        r.get::<_, Option<DateTime<Utc>>>(4)?,
                        r.get::<_, bool>(5)?,
                        r.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, email, name, created_at, last_login, is_active, profile)| {
            Ok(User {
                id,
                email,
                name,
                created_at,
                last_login,
                is_active,
                profile: serde_json::from_str(&profile)?,
            })
        })
        .transpose()
    }

    fn require_user(&self, user_id: &str) -> Result<User, StoreError> {
        self.user(user_id)?
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))
    }

    fn write_profile(&self, user_id: &str, profile: &Profile) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE users SET profile_data = ?1 WHERE id = ?2",
            params![serde_json::to_string(profile)?, user_id],
        )?;
        Ok(())
    }

    pub fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<User, StoreError> {
        let mut user = self.require_user(user_id)?;
        let name = match update.name {
            Some(n) if n.trim().is_empty() => {
                return Err(StoreError::Invalid("name must not be empty".into()));
            }
            Some(n) => Some(n.trim().to_string()),
            None => None,
        };
        let p = &mut user.profile;
        if let Some(level) = update.skill_level {
            p.skill_level = level;
        }
        if let Some(lang) = update.preferred_language {
            p.preferred_language = lang;
        }
        if let Some(goal) = update.daily_goal_minutes {
            if goal == 0 {
                return Err(StoreError::Invalid("daily goal must be at least one minute".into()));
            }
            p.daily_goal_minutes = goal;
        }
        if let Some(difficulty) = update.difficulty {
            p.difficulty = difficulty;
        }
        self.write_profile(user_id, &user.profile)?;

        if let Some(name) = name {
            self.conn
                .execute("UPDATE users SET name = ?1 WHERE id = ?2", params![name, user_id])?;
            user.name = name;
        }
        Ok(user)
    }

    /// Returns false when an achievement with the same id already exists.
    pub fn add_achievement(
        &self,
        user_id: &str,
        mut achievement: Achievement,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut user = self.require_user(user_id)?;
        if user.profile.achievements.iter().any(|a| a.id == achievement.id) {
            return Ok(false);
        }
        achievement.earned_at = Some(now);
        tracing::info!(user = %user_id, achievement = %achievement.id, "achievement earned");
        user.profile.achievements.push(achievement);
        self.write_profile(user_id, &user.profile)?;
        Ok(true)
    }

    /// Delete a user and, through cascades, everything they own.
    pub fn delete_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let n = self.conn.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
        if n > 0 {
            tracing::info!(user = %user_id, "user deleted");
        }
        Ok(n > 0)
    }

    /// Everything stored about a user, without the password hash.
    pub fn export_user(&self, user_id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let Some(user) = self.user(user_id)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::json!({
            "user": user,
            "progress": self.all_progress(user_id)?,
            "practice_sessions": self.practice_sessions(user_id)?,
            "quiz_results": self.quiz_results(user_id)?,
            "challenges": self.challenge_results(user_id)?,
            "language_stats": self.language_stats(user_id)?,
            "activity": self.recent_activity(user_id, u32::MAX)?,
        })))
    }

    // --- sessions and activity ---

    pub fn create_session(
        &self,
        user_id: &str,
        device_info: &str,
        ip_address: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO user_sessions (id, user_id, device_info, ip_address, session_start)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user_id, device_info, ip_address, now],
        )?;
        Ok(id)
    }

    /// Returns false if the session was unknown or already ended.
    pub fn end_session(&self, session_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let n = self.conn.execute(
            "UPDATE user_sessions SET session_end = ?1, is_active = 0 WHERE id = ?2 AND is_active = 1",
            params![now, session_id],
        )?;
        Ok(n > 0)
    }

    /// User owning an active login session.
    pub fn session_user(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT user_id FROM user_sessions WHERE id = ?1 AND is_active = 1",
                [session_id],
                |r| r.get(0),
            )
            .optional()?)
    }

    pub fn log_activity(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        activity_type: &str,
        data: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO activity_logs (user_id, session_id, activity_type, activity_data, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, session_id, activity_type, data.to_string(), now],
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn recent_activity(&self, user_id: &str, limit: u32) -> Result<Vec<Activity>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT activity_type, activity_data, timestamp FROM activity_logs
             WHERE user_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, i64::from(limit)], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, DateTime<Utc>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(activity_type, data, timestamp)| {
                let activity_data = match data {
                    Some(s) => serde_json::from_str(&s)?,
                    None => serde_json::Value::Null,
                };
                Ok(Activity {
                    activity_type,
                    activity_data,
                    timestamp,
                })
            })
            .collect()
    }

    // --- progress ---

    /// Accumulate signs and minutes, replace accuracy and level. Creates the
    /// row when the language has no progress yet.
    pub fn update_progress(
        &self,
        user_id: &str,
        language: &str,
        update: &ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(acc) = update.accuracy_score {
            if !(0.0..=1.0).contains(&acc) {
                return Err(StoreError::Invalid(format!("accuracy must be a fraction, got {acc}")));
            }
        }
        self.conn.execute(
            "INSERT INTO user_progress (user_id, language, signs_learned, accuracy_score, practice_time, level, last_updated)
             VALUES (?1, ?2, ?3, COALESCE(?4, 0.0), ?5, COALESCE(?6, 'Beginner'), ?7)
             ON CONFLICT (user_id, language) DO UPDATE SET
                 signs_learned  = signs_learned + excluded.signs_learned,
                 accuracy_score = COALESCE(?4, accuracy_score),
                 practice_time  = practice_time + excluded.practice_time,
                 level          = COALESCE(?6, level),
                 last_updated   = excluded.last_updated",
            params![
                user_id,
                language,
                update.signs_learned.unwrap_or(0),
                update.accuracy_score,
                update.practice_time.unwrap_or(0),
                update.level.map(SkillLevel::as_str),
                now,
            ],
        )?;
        Ok(())
    }

    fn progress_rows(&self, user_id: &str, language: Option<&str>) -> Result<Vec<LanguageProgress>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT language, signs_learned, accuracy_score, practice_time, level, last_updated
             FROM user_progress WHERE user_id = ?1 AND (?2 IS NULL OR language = ?2) ORDER BY language",
        )?;
        let rows = stmt
            .query_map(params![user_id, language], |r| {
                Ok(LanguageProgress {
                    language: r.get(0)?,
                    signs_learned: r.get(1)?,
                    accuracy_score: r.get(2)?,
                    practice_time: r.get(3)?,
                    level: SkillLevel::parse(&r.get::<_, String>(4)?),
                    last_updated: r.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn progress(&self, user_id: &str, language: &str) -> Result<Option<LanguageProgress>, StoreError> {
        Ok(self.progress_rows(user_id, Some(language))?.into_iter().next())
    }

    pub fn all_progress(&self, user_id: &str) -> Result<Vec<LanguageProgress>, StoreError> {
        self.progress_rows(user_id, None)
    }

    // --- results ---

    /// Store a finished quiz and log it as practice activity.
    pub fn save_quiz_result(&self, user_id: &str, results: &QuizResults) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO quiz_results (user_id, language, quiz_id, score, total_questions, time_taken, completed_at, answers)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                results.language,
                results.quiz_id.to_string(),
                results.correct_signs,
                results.total_signs as i64,
                results.time_taken_secs.round() as i64,
                results.completed_at,
                serde_json::to_string(&results.attempts)?,
            ],
        )?;
        let data = serde_json::json!({
            "quiz_id": results.quiz_id,
            "kind": results.quiz_kind,
            "language": results.language,
            "accuracy": results.accuracy,
            "passed": results.passed,
            "xp_earned": results.xp_earned,
        });
        self.log_activity(user_id, None, ACTIVITY_QUIZ, &data, results.completed_at)
    }

    pub fn quiz_results(&self, user_id: &str) -> Result<Vec<QuizResultRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT quiz_id, language, score, total_questions, COALESCE(time_taken, 0), completed_at
             FROM quiz_results WHERE user_id = ?1 ORDER BY completed_at",
        )?;
        let rows = stmt
            .query_map([user_id], |r| {
                Ok(QuizResultRow {
                    quiz_id: r.get(0)?,
                    language: r.get(1)?,
                    score: r.get(2)?,
                    total_questions: r.get(3)?,
                    time_taken_secs: r.get::<_, i64>(4)?.max(0) as u64,
                    completed_at: r.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert or update a practice session. Ending a session logs it as
    /// practice activity once.
    pub fn save_practice_session(&self, session: &PracticeSession) -> Result<(), StoreError> {
        let was_ended: bool = self
            .conn
            .query_row(
                "SELECT end_time IS NOT NULL FROM practice_sessions WHERE id = ?1",
                [&session.id],
                |r| r.get(0),
            )
            .optional()?
            .unwrap_or(false);

        let avg_conf = if session.confidence_scores.is_empty() {
            0.0
        } else {
            session.confidence_scores.iter().map(|&c| f64::from(c)).sum::<f64>()
                / session.confidence_scores.len() as f64
        };

        self.conn.execute(
            "INSERT INTO practice_sessions (id, user_id, language, session_type, start_time, end_time,
                 signs_practiced, correct_signs, total_attempts, average_confidence, session_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT (id) DO UPDATE SET
                 end_time = excluded.end_time,
                 signs_practiced = excluded.signs_practiced,
                 correct_signs = excluded.correct_signs,
                 total_attempts = excluded.total_attempts,
                 average_confidence = excluded.average_confidence,
                 session_data = excluded.session_data",
            params![
                session.id,
                session.user_id,
                session.language,
                session.kind.as_str(),
                session.start_time,
                session.end_time,
                session.signs_attempted.len() as i64,
                session.total_correct,
                session.total_attempts,
                avg_conf,
                serde_json::to_string(session)?,
            ],
        )?;

        if let (Some(end), false) = (session.end_time, was_ended) {
            let data = serde_json::json!({
                "session_id": session.id,
                "language": session.language,
                "accuracy": session.accuracy,
                "duration_minutes": session.duration_minutes,
            });
            self.log_activity(&session.user_id, None, ACTIVITY_PRACTICE, &data, end)?;
        }
        Ok(())
    }

    /// All practice sessions for a user, oldest first.
    pub fn practice_sessions(&self, user_id: &str) -> Result<Vec<PracticeSession>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT session_data FROM practice_sessions WHERE user_id = ?1 ORDER BY start_time")?;
        let raw = stmt
            .query_map([user_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.iter()
            .map(|s| serde_json::from_str(s).map_err(StoreError::from))
            .collect()
    }

    pub fn record_sign_attempt(&self, attempt: &SignAttempt) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sign_attempts (user_id, session_id, language, target_sign, predicted_sign,
                 confidence, is_correct, attempt_time, feedback)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                attempt.user_id,
                attempt.session_id,
                attempt.language,
                attempt.target_sign,
                attempt.predicted_sign,
                attempt.confidence,
                attempt.is_correct,
                attempt.attempt_time,
                attempt.feedback,
            ],
        )?;
        Ok(())
    }

    pub fn language_stats(&self, user_id: &str) -> Result<BTreeMap<String, LanguageStats>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT language, COUNT(*), COALESCE(AVG(confidence), 0.0),
                    SUM(CASE WHEN is_correct = 1 THEN 1 ELSE 0 END)
             FROM sign_attempts WHERE user_id = ?1 GROUP BY language",
        )?;
        let rows = stmt
            .query_map([user_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, u32>(1)?,
                    r.get::<_, f64>(2)?,
                    r.get::<_, u32>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(lang, total, avg_conf, correct)| {
                let rate = if total > 0 {
                    round1(f64::from(correct) / f64::from(total) * 100.0)
                } else {
                    0.0
                };
                (
                    lang,
                    LanguageStats {
                        total_attempts: total,
                        average_confidence: round1(avg_conf * 100.0),
                        accuracy_rate: rate,
                        correct_attempts: correct,
                    },
                )
            })
            .collect())
    }

    // --- challenges ---

    /// Record a finished run. A second daily completion on the same date
    /// is refused.
    pub fn record_challenge(&self, user_id: &str, result: &ChallengeResult) -> Result<(), StoreError> {
        let date = result.completed_at.date_naive();
        if result.daily && self.challenge_completed_on(user_id, date)? {
            return Err(StoreError::DailyChallengeDone(date));
        }
        self.conn.execute(
            "INSERT INTO daily_challenges (user_id, challenge_id, language, completed, daily, score,
                 completed_at, challenge_date, result_data)
             VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                result.kind.as_str(),
                result.language,
                result.daily,
                result.final_score,
                result.completed_at,
                date,
                serde_json::to_string(result)?,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(f, _)
                if result.daily && f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::DailyChallengeDone(date)
            }
            e => e.into(),
        })?;
        Ok(())
    }

    /// Whether the user finished the daily challenge on `date`.
    pub fn challenge_completed_on(&self, user_id: &str, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM daily_challenges
                 WHERE user_id = ?1 AND challenge_date = ?2 AND daily = 1 AND completed = 1)",
            params![user_id, date],
            |r| r.get(0),
        )?)
    }

    /// Completed challenges, oldest first.
    pub fn challenge_results(&self, user_id: &str) -> Result<Vec<ChallengeResult>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT result_data FROM daily_challenges
             WHERE user_id = ?1 AND result_data IS NOT NULL ORDER BY completed_at, id",
        )?;
        let raw = stmt
            .query_map([user_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.iter()
            .map(|s| serde_json::from_str(s).map_err(StoreError::from))
            .collect()
    }

    // --- reports ---

    fn practice_days(&self, user_id: &str) -> Result<BTreeSet<NaiveDate>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp FROM activity_logs WHERE user_id = ?1 AND activity_type IN (?2, ?3)",
        )?;
        let days = stmt
            .query_map(params![user_id, ACTIVITY_PRACTICE, ACTIVITY_QUIZ], |r| {
                r.get::<_, DateTime<Utc>>(0)
            })?
            .map(|ts| ts.map(|t| t.date_naive()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(days)
    }

    pub fn user_stats(&self, user_id: &str, today: NaiveDate) -> Result<UserStats, StoreError> {
        self.require_user(user_id)?;

        let (signs, accuracy, minutes): (u32, f64, u32) = self.conn.query_row(
            "SELECT COALESCE(SUM(signs_learned), 0), COALESCE(AVG(accuracy_score), 0.0),
                    COALESCE(SUM(practice_time), 0)
             FROM user_progress WHERE user_id = ?1",
            [user_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;

        let (quizzes, quiz_avg): (u32, f64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(AVG(CASE WHEN total_questions > 0
                                               THEN score * 1.0 / total_questions END), 0.0)
             FROM quiz_results WHERE user_id = ?1",
            [user_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        let sessions: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM practice_sessions WHERE user_id = ?1 AND end_time IS NOT NULL",
            [user_id],
            |r| r.get(0),
        )?;

        let days = self.practice_days(user_id)?;
        let streak = progress::streaks(&days, today);

        Ok(UserStats {
            total_signs_learned: signs,
            average_accuracy: round1(accuracy * 100.0),
            total_practice_time: minutes,
            quizzes_completed: quizzes,
            average_quiz_score: round1(quiz_avg * 100.0),
            practice_sessions: sessions,
            current_streak: streak.current_streak,
            best_streak: streak.best_streak,
            practice_dates: days.iter().rev().take(7).copied().collect(),
        })
    }

    /// Active users ranked by the chosen metric, best first.
    pub fn leaderboard(&self, metric: LeaderboardMetric, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT u.name, u.profile_data,
                    COALESCE(SUM(p.signs_learned), 0),
                    COALESCE(AVG(p.accuracy_score), 0.0),
                    COALESCE(SUM(p.practice_time), 0)
             FROM users u LEFT JOIN user_progress p ON p.user_id = u.id
             WHERE u.is_active = 1
             GROUP BY u.id",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, f64>(3)?,
                    r.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (name, profile, signs, accuracy, minutes) in rows {
            let level = serde_json::from_str::<Profile>(&profile)?.skill_level;
            let value = match metric {
                LeaderboardMetric::SignsLearned => signs as f64,
                LeaderboardMetric::Accuracy => round1(accuracy * 100.0),
                LeaderboardMetric::PracticeTime => round1(minutes as f64 / 60.0),
            };
            entries.push(LeaderboardEntry {
                rank: 0,
                name,
                value,
                level,
            });
        }

        entries.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
        entries.truncate(limit);
        for (i, e) in entries.iter_mut().enumerate() {
            e.rank = i as u32 + 1;
        }
        Ok(entries)
    }

    /// Minutes practiced today (by session start) against the profile goal.
    pub fn daily_goal(&self, user_id: &str, today: NaiveDate) -> Result<DailyGoal, StoreError> {
        let user = self.require_user(user_id)?;
        let goal = user.profile.daily_goal_minutes.max(1);
        let minutes: f64 = self
            .practice_sessions(user_id)?
            .iter()
            .filter(|s| s.start_time.date_naive() == today)
            .map(|s| s.duration_minutes)
            .sum();

        Ok(DailyGoal {
            met_goal: minutes >= f64::from(goal),
            progress: round1((minutes / f64::from(goal) * 100.0).min(100.0)),
            today_minutes: round1(minutes),
            goal_minutes: goal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use signlab_core::challenge::ChallengeKind;
    use signlab_core::progress::SessionKind;
    use signlab_core::scoring::QuizDifficulty;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn store_with_user() -> (Store, String) {
        let mut store = Store::open_in_memory().unwrap();
        let id = store
            .create_user("Ada@Example.com", "hunter22", "Ada", now())
            .unwrap();
        (store, id)
    }

    fn ended_session(user: &str, start: DateTime<Utc>, minutes: i64) -> PracticeSession {
        let mut s = PracticeSession::start(user, SessionKind::Practice, "ASL", start);
        s.record_attempt("hello", true, 0.9);
        s.record_attempt("yes", false, 0.4);
        s.end(start + Duration::minutes(minutes));
        s
    }

    #[test]
    fn test_create_user_defaults() {
        let (store, id) = store_with_user();
        let user = store.user(&id).unwrap().unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.profile, Profile::default());
        assert_eq!(user.profile.difficulty, QuizDifficulty::Easy);

        let asl = store.progress(&id, "ASL").unwrap().unwrap();
        assert_eq!(asl.signs_learned, 0);
        assert_eq!(asl.level, SkillLevel::Beginner);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (mut store, _) = store_with_user();
        let err = store
            .create_user("ada@example.com", "another1", "Other", now())
            .unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken(_)));
    }

    #[test]
    fn test_invalid_registration() {
        let mut store = Store::open_in_memory().unwrap();
        assert!(matches!(
            store.create_user("nope", "hunter22", "X", now()),
            Err(StoreError::Invalid(_))
        ));
        assert!(matches!(
            store.create_user("a@b.c", "123", "X", now()),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn test_authenticate() {
        let (store, id) = store_with_user();
        let later = now() + Duration::hours(1);
        let user = store.authenticate("ada@example.com", "hunter22", later).unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.last_login, Some(later));

        assert!(store.authenticate("ada@example.com", "wrong", later).unwrap().is_none());
        assert!(store.authenticate("bob@example.com", "hunter22", later).unwrap().is_none());

        store
            .conn
            .execute("UPDATE users SET is_active = 0 WHERE id = ?1", [&id])
            .unwrap();
        assert!(store.authenticate("ada@example.com", "hunter22", later).unwrap().is_none());
    }

    #[test]
    fn test_sessions() {
        let (store, id) = store_with_user();
        let sid = store.create_session(&id, "cli", Some("127.0.0.1"), now()).unwrap();
        assert_eq!(store.session_user(&sid).unwrap(), Some(id));
        assert!(store.end_session(&sid, now()).unwrap());
        assert!(!store.end_session(&sid, now()).unwrap());
        assert!(store.session_user(&sid).unwrap().is_none());
    }

    #[test]
    fn test_update_progress_accumulates() {
        let (store, id) = store_with_user();
        let upd = ProgressUpdate {
            signs_learned: Some(5),
            accuracy_score: Some(0.8),
            practice_time: Some(10),
            level: None,
        };
        store.update_progress(&id, "ASL", &upd, now()).unwrap();
        store.update_progress(&id, "ASL", &upd, now()).unwrap();
        let p = store.progress(&id, "ASL").unwrap().unwrap();
        assert_eq!(p.signs_learned, 10);
        assert_eq!(p.practice_time, 20);
        assert!((p.accuracy_score - 0.8).abs() < 1e-9);

        let level_only = ProgressUpdate {
            level: Some(SkillLevel::Intermediate),
            ..Default::default()
        };
        store.update_progress(&id, "BSL", &level_only, now()).unwrap();
        assert_eq!(store.all_progress(&id).unwrap().len(), 2);
        let bsl = store.progress(&id, "BSL").unwrap().unwrap();
        assert_eq!(bsl.level, SkillLevel::Intermediate);
        assert_eq!(bsl.signs_learned, 0);

        let bad = ProgressUpdate {
            accuracy_score: Some(75.0),
            ..Default::default()
        };
        assert!(store.update_progress(&id, "ASL", &bad, now()).is_err());
    }

    #[test]
    fn test_practice_session_round_trip_and_activity() {
        let (store, id) = store_with_user();
        let mut s = PracticeSession::start(&id, SessionKind::Practice, "ASL", now());
        s.record_attempt("hello", true, 0.9);
        store.save_practice_session(&s).unwrap();
        assert!(store.recent_activity(&id, 10).unwrap().is_empty());

        s.end(now() + Duration::minutes(12));
        store.save_practice_session(&s).unwrap();
        store.save_practice_session(&s).unwrap();

        let loaded = store.practice_sessions(&id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, s.id);
        assert!(loaded[0].end_time.is_some());

        let activity = store.recent_activity(&id, 10).unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].activity_type, ACTIVITY_PRACTICE);
    }

    #[test]
    fn test_language_stats() {
        let (store, id) = store_with_user();
        for (pred, ok, conf) in [("hello", true, 0.9f32), ("no", false, 0.5)] {
            store
                .record_sign_attempt(&SignAttempt {
                    user_id: id.clone(),
                    session_id: "s1".into(),
                    language: "ASL".into(),
                    target_sign: "hello".into(),
                    predicted_sign: pred.into(),
                    confidence: conf,
                    is_correct: ok,
                    feedback: None,
                    attempt_time: now(),
                })
                .unwrap();
        }
        let stats = store.language_stats(&id).unwrap();
        let asl = &stats["ASL"];
        assert_eq!(asl.total_attempts, 2);
        assert_eq!(asl.correct_attempts, 1);
        assert_eq!(asl.accuracy_rate, 50.0);
        assert_eq!(asl.average_confidence, 70.0);
    }

    #[test]
    fn test_user_stats_streak() {
        let (store, id) = store_with_user();
        let today = now().date_naive();
        for days_ago in [0, 1, 2, 5] {
            let start = now() - Duration::days(days_ago);
            store.save_practice_session(&ended_session(&id, start, 10)).unwrap();
        }
        let stats = store.user_stats(&id, today).unwrap();
        assert_eq!(stats.practice_sessions, 4);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.best_streak, 3);
        assert_eq!(stats.practice_dates[0], today);
        assert_eq!(stats.practice_dates.len(), 4);

        assert!(matches!(
            store.user_stats("missing", today),
            Err(StoreError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_challenges() {
        let (store, id) = store_with_user();
        let result = ChallengeResult {
            run_id: uuid::Uuid::new_v4(),
            kind: ChallengeKind::SpeedSigning,
            language: "ASL".into(),
            daily: true,
            final_score: 40,
            signs_completed: 4,
            efficiency: 1000.0,
            completed_at: now(),
        };
        assert!(!store.challenge_completed_on(&id, now().date_naive()).unwrap());
        store.record_challenge(&id, &result).unwrap();
        assert!(store.challenge_completed_on(&id, now().date_naive()).unwrap());
        assert!(!store
            .challenge_completed_on(&id, now().date_naive() - Duration::days(1))
            .unwrap());
        let history = store.challenge_results(&id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].final_score, 40);
    }

    #[test]
    fn test_daily_challenge_recorded_once_per_day() {
        let (store, id) = store_with_user();
        let result = |minutes: i64, daily: bool| ChallengeResult {
            run_id: uuid::Uuid::new_v4(),
            kind: ChallengeKind::RapidFire,
            language: "ASL".into(),
            daily,
            final_score: 10,
            signs_completed: 2,
            efficiency: 100.0,
            completed_at: now() + Duration::minutes(minutes),
        };
        store.record_challenge(&id, &result(0, true)).unwrap();
        assert!(matches!(
            store.record_challenge(&id, &result(5, true)),
            Err(StoreError::DailyChallengeDone(d)) if d == now().date_naive()
        ));
        // Non-daily runs are unlimited, and the next day is a fresh slot.
        store.record_challenge(&id, &result(6, false)).unwrap();
        store.record_challenge(&id, &result(7, false)).unwrap();
        store.record_challenge(&id, &result(24 * 60, true)).unwrap();
        assert_eq!(store.challenge_results(&id).unwrap().len(), 4);

        // The index holds even when the pre-check is bypassed.
        let err = store
            .conn
            .execute(
                "INSERT INTO daily_challenges (user_id, challenge_id, language, completed, daily, challenge_date)
                 VALUES (?1, 'rapid_fire', 'ASL', 1, 1, ?2)",
                params![id, now().date_naive()],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation
        ));
    }

    #[test]
    fn test_profile_and_achievements() {
        let (store, id) = store_with_user();
        let user = store
            .update_profile(
                &id,
                ProfileUpdate {
                    name: Some("Ada L".into()),
                    daily_goal_minutes: Some(30),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(user.name, "Ada L");
        assert_eq!(user.profile.daily_goal_minutes, 30);

        let badge = Achievement {
            id: "first_sign".into(),
            name: "First Sign".into(),
            description: "Learned your first sign".into(),
            earned_at: None,
        };
        assert!(store.add_achievement(&id, badge.clone(), now()).unwrap());
        assert!(!store.add_achievement(&id, badge, now()).unwrap());
        let user = store.user(&id).unwrap().unwrap();
        assert_eq!(user.profile.achievements.len(), 1);
        assert_eq!(user.profile.achievements[0].earned_at, Some(now()));
    }

    #[test]
    fn test_export_and_delete() {
        let (store, id) = store_with_user();
        store.save_practice_session(&ended_session(&id, now(), 5)).unwrap();

        let export = store.export_user(&id).unwrap().unwrap();
        let text = export.to_string();
        assert!(!text.contains("password"));
        assert!(!text.contains('$'));
        assert_eq!(export["practice_sessions"].as_array().unwrap().len(), 1);

        assert!(store.delete_user(&id).unwrap());
        assert!(!store.delete_user(&id).unwrap());
        assert!(store.export_user(&id).unwrap().is_none());
        assert!(store.practice_sessions(&id).unwrap().is_empty());
        assert!(store.all_progress(&id).unwrap().is_empty());
    }

    #[test]
    fn test_leaderboard() {
        let (mut store, ada) = store_with_user();
        let bob = store.create_user("bob@example.com", "hunter22", "Bob", now()).unwrap();
        store
            .update_progress(&ada, "ASL", &ProgressUpdate { signs_learned: Some(5), accuracy_score: Some(0.9), practice_time: Some(30), level: None }, now())
            .unwrap();
        store
            .update_progress(&bob, "ASL", &ProgressUpdate { signs_learned: Some(8), accuracy_score: Some(0.6), practice_time: Some(120), level: None }, now())
            .unwrap();

        let by_signs = store.leaderboard(LeaderboardMetric::SignsLearned, 10).unwrap();
        assert_eq!(by_signs[0].name, "Bob");
        assert_eq!(by_signs[0].rank, 1);
        assert_eq!(by_signs[1].value, 5.0);

        let by_acc = store.leaderboard(LeaderboardMetric::Accuracy, 1).unwrap();
        assert_eq!(by_acc.len(), 1);
        assert_eq!(by_acc[0].name, "Ada");
        assert_eq!(by_acc[0].value, 90.0);

        let by_time = store.leaderboard(LeaderboardMetric::PracticeTime, 10).unwrap();
        assert_eq!(by_time[0].value, 2.0);
    }

    #[test]
    fn test_daily_goal() {
        let (store, id) = store_with_user();
        let today = now().date_naive();
        let goal = store.daily_goal(&id, today).unwrap();
        assert!(!goal.met_goal);
        assert_eq!(goal.goal_minutes, 15);
        assert_eq!(goal.progress, 0.0);

        store.save_practice_session(&ended_session(&id, now(), 6)).unwrap();
        store
            .save_practice_session(&ended_session(&id, now() + Duration::minutes(30), 12))
            .unwrap();
        let goal = store.daily_goal(&id, today).unwrap();
        assert!(goal.met_goal);
        assert_eq!(goal.progress, 100.0);
        assert_eq!(goal.today_minutes, 18.0);
    }
}
