//! Follow graph.
//!
//! Only the follower's side is stored. Follower counts on profiles are a cache that
//! [`UserDatabase::recount_followers`] can rebuild from the registry.

use chrono::Utc;

use super::{user_key, validate_user_id, Record, UserDatabase};
use crate::errors::AppError;
use crate::storage::Batch;

impl UserDatabase {
    pub async fn get_user_following(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        self.read_list(user_id, Record::Following).await
    }

    /// Returns whether the follow graph changed.
    pub async fn follow_user(&self, user_id: &str, target_id: &str) -> Result<bool, AppError> {
        self.set_following(user_id, target_id, true).await
    }

    /// Returns whether the follow graph changed.
    pub async fn unfollow_user(&self, user_id: &str, target_id: &str) -> Result<bool, AppError> {
        self.set_following(user_id, target_id, false).await
    }

    async fn set_following(
        &self,
        user_id: &str,
        target_id: &str,
        follow: bool,
    ) -> Result<bool, AppError> {
        validate_user_id(user_id)?;
        validate_user_id(target_id)?;
        if user_id == target_id {
            return Err(AppError::Validation("Users cannot follow themselves".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let mut following = self.get_user_following(user_id).await?;
        let present = following.iter().any(|f| f == target_id);
        if present == follow {
            return Ok(false);
        }

        if follow {
            following.push(target_id.to_string());
        } else {
            following.retain(|f| f != target_id);
        }

        let mut batch = Batch::new();
        batch.put(user_key(user_id, Record::Following), &following)?;
        let count = following.len() as u64;
        self.stage_stats_change(&mut batch, user_id, |stats| stats.following = count)
            .await?;
        self.stage_stats_change(&mut batch, target_id, |stats| {
            stats.followers = if follow {
                stats.followers + 1
            } else {
                stats.followers.saturating_sub(1)
            }
        })
        .await?;
        self.storage.apply(batch).await?;

        tracing::debug!(user_id, target_id, follow, "Updated follow graph");
        Ok(true)
    }

    /// Registered users whose following list contains `user_id`.
    pub async fn get_followers(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let registry = self.get_global_data().await?;
        let mut followers = Vec::new();
        for candidate in &registry.users {
            if candidate == user_id {
                continue;
            }
            let following = self.get_user_following(candidate).await?;
            if following.iter().any(|f| f == user_id) {
                followers.push(candidate.clone());
            }
        }
        Ok(followers)
    }

    /// Rebuild the cached follower count of `user_id` from the follow graph.
    pub async fn recount_followers(&self, user_id: &str) -> Result<u64, AppError> {
        let _guard = self.write_lock.lock().await;
        let count = self.get_followers(user_id).await?.len() as u64;

        let Some(mut profile) = self.get_user_profile(user_id).await? else {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        };
        if profile.stats.followers != count {
            tracing::info!(
                user_id,
                cached = profile.stats.followers,
                actual = count,
                "Repairing follower count"
            );
            profile.stats.followers = count;
            profile.updated_at = Utc::now();
            self.storage
                .set(&user_key(user_id, Record::Profile), &profile)
                .await?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::UserDatabase;
    use crate::errors::AppError;
    use crate::models::NewUser;

    async fn db_with(users: &[&str]) -> UserDatabase {
        let db = UserDatabase::in_memory();
        for id in users {
            db.initialize_user(id, &NewUser::default()).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_follow_unfollow_keeps_counts_in_step() {
        let db = db_with(&["a", "b"]).await;

        assert!(db.follow_user("a", "b").await.unwrap());
        assert!(!db.follow_user("a", "b").await.unwrap());

        let a = db.get_user_profile("a").await.unwrap().unwrap();
        let b = db.get_user_profile("b").await.unwrap().unwrap();
        assert_eq!(a.stats.following, 1);
        assert_eq!(b.stats.followers, 1);
        assert_eq!(db.get_followers("b").await.unwrap(), vec!["a"]);

        assert!(db.unfollow_user("a", "b").await.unwrap());
        assert!(!db.unfollow_user("a", "b").await.unwrap());

        let a = db.get_user_profile("a").await.unwrap().unwrap();
        let b = db.get_user_profile("b").await.unwrap().unwrap();
        assert_eq!(a.stats.following, 0);
        assert_eq!(b.stats.followers, 0);
        assert!(db.get_user_following("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_self_follow_is_rejected() {
        let db = db_with(&["a"]).await;
        let err = db.follow_user("a", "a").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_follow_unknown_target_only_touches_follower() {
        let db = db_with(&["a"]).await;
        assert!(db.follow_user("a", "ghost").await.unwrap());

        assert!(db.get_user_profile("ghost").await.unwrap().is_none());
        assert_eq!(db.get_user_following("a").await.unwrap(), vec!["ghost"]);
    }

    #[tokio::test]
    async fn test_unfollow_clamps_followers_at_zero() {
        let db = db_with(&["a", "b"]).await;
        db.follow_user("a", "b").await.unwrap();

        // Cached count already lost the follower
        let mut b = db.get_user_profile("b").await.unwrap().unwrap();
        b.stats.followers = 0;
        db.storage
            .set(&crate::db::user_key("b", crate::db::Record::Profile), &b)
            .await
            .unwrap();

        assert!(db.unfollow_user("a", "b").await.unwrap());
        let b = db.get_user_profile("b").await.unwrap().unwrap();
        assert_eq!(b.stats.followers, 0);
    }

    #[tokio::test]
    async fn test_recount_repairs_drift() {
        let db = db_with(&["a", "b", "c"]).await;
        db.follow_user("a", "c").await.unwrap();
        db.follow_user("b", "c").await.unwrap();

        // Follower cache lost, e.g. by a profile restore
        let mut c = db.get_user_profile("c").await.unwrap().unwrap();
        c.stats.followers = 0;
        db.storage
            .set(&crate::db::user_key("c", crate::db::Record::Profile), &c)
            .await
            .unwrap();

        assert_eq!(db.recount_followers("c").await.unwrap(), 2);
        let c = db.get_user_profile("c").await.unwrap().unwrap();
        assert_eq!(c.stats.followers, 2);
    }
}
