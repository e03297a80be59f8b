use std::sync::Arc;
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use super::notifications::PasswordResetNotifier;
use crate::error::{CinemaError, CinemaResult};
use crate::models::{NewUser, User, UserRole};
use crate::store::{CinemaStore, StoreError};

// bcrypt is CPU-bound for hundreds of milliseconds at the default cost and
// must stay off the async workers.
async fn hash_password(password: &str, cost: u32) -> CinemaResult<String> {
    let password = password.to_owned();
    Ok(task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

async fn verify_password(password: &str, hash: &str) -> CinemaResult<bool> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    Ok(task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
}

pub struct UserService<S> {
    store: Arc<S>,
    notifier: Arc<dyn PasswordResetNotifier>,
    bcrypt_cost: u32,
}

impl<S: CinemaStore> UserService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn PasswordResetNotifier>, bcrypt_cost: u32) -> Self {
        Self {
            store,
            notifier,
            bcrypt_cost,
        }
    }

    pub async fn create_user(&self, mail: &str, password: &str) -> CinemaResult<User> {
        self.add(mail, password, UserRole::Common).await
    }

    /// Ensures an admin account exists; returns `true` if one was created.
    pub async fn create_admin_if_missing(&self, mail: &str, password: &str) -> CinemaResult<bool> {
        if self.store.user_by_mail(mail).await?.is_some() {
            return Ok(false);
        }
        match self.add(mail, password, UserRole::Admin).await {
            Ok(_) => {
                info!(mail, "admin account created");
                Ok(true)
            }
            // Another instance won the bootstrap race.
            Err(CinemaError::MailTaken) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn authenticate(&self, mail: &str, password: &str) -> CinemaResult<User> {
        let user = self
            .store
            .user_by_mail(mail)
            .await?
            .ok_or(CinemaError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash).await? {
            warn!(mail, "rejected credentials");
            return Err(CinemaError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn reset_password(&self, mail: &str) -> CinemaResult<()> {
        let user = self
            .store
            .user_by_mail(mail)
            .await?
            .ok_or(CinemaError::UserNotFound)?;
        let token = Uuid::new_v4();
        self.store.set_reset_token(user.id, token).await?;
        self.notifier.notify(&user.mail, token).await;
        Ok(())
    }

    pub async fn set_new_password(&self, token: Uuid, new_password: &str) -> CinemaResult<()> {
        let user = self
            .store
            .user_by_reset_token(token)
            .await?
            .ok_or(CinemaError::UserNotFound)?;
        let hash = hash_password(new_password, self.bcrypt_cost).await?;
        self.store.update_password(user.id, &hash).await?;
        info!(user_id = user.id, "password changed");
        Ok(())
    }

    async fn add(&self, mail: &str, password: &str, role: UserRole) -> CinemaResult<User> {
        let password_hash = hash_password(password, self.bcrypt_cost).await?;
        let new_user = NewUser {
            mail: mail.to_string(),
            password_hash,
            role,
        };
        match self.store.add_user(new_user).await {
            Ok(user) => Ok(user),
            Err(StoreError::Duplicate(_)) => Err(CinemaError::MailTaken),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(String, Uuid)>>,
    }

    #[async_trait]
    impl PasswordResetNotifier for Outbox {
        async fn notify(&self, mail: &str, token: Uuid) {
            self.sent.lock().await.push((mail.to_string(), token));
        }
    }

    fn service() -> (UserService<MemoryStore>, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        let service = UserService::new(Arc::new(MemoryStore::new()), outbox.clone(), 4);
        (service, outbox)
    }

    #[tokio::test]
    async fn registered_user_can_authenticate() {
        let (users, _) = service();
        let user = users.create_user("ann@example.com", "s3cret").await.unwrap();
        assert_eq!(user.role, UserRole::Common);
        assert_ne!(user.password_hash, "s3cret");

        users.authenticate("ann@example.com", "s3cret").await.unwrap();
        assert!(matches!(
            users.authenticate("ann@example.com", "wrong").await,
            Err(CinemaError::InvalidCredentials)
        ));
        assert!(matches!(
            users.authenticate("bob@example.com", "s3cret").await,
            Err(CinemaError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn password_checks_leave_the_runtime_free() {
        let store = Arc::new(MemoryStore::new());
        let users = UserService::new(store, Arc::new(Outbox::default()), 10);
        users.create_user("ann@example.com", "s3cret").await.unwrap();

        // On this single-threaded runtime an inline bcrypt call would finish
        // before the timer could ever be polled.
        let timer_won = tokio::select! {
            biased;
            _ = users.authenticate("ann@example.com", "s3cret") => false,
            _ = tokio::time::sleep(std::time::Duration::from_millis(2)) => true,
        };
        assert!(timer_won);
    }

    #[tokio::test]
    async fn mail_must_be_unique() {
        let (users, _) = service();
        users.create_user("ann@example.com", "a").await.unwrap();
        assert!(matches!(
            users.create_user("ann@example.com", "b").await,
            Err(CinemaError::MailTaken)
        ));
    }

    #[tokio::test]
    async fn admin_bootstrap_is_idempotent() {
        let (users, _) = service();
        assert!(users.create_admin_if_missing("root@cinema", "pw").await.unwrap());
        assert!(!users.create_admin_if_missing("root@cinema", "pw").await.unwrap());
        let admin = users.authenticate("root@cinema", "pw").await.unwrap();
        assert!(admin.is_admin());
    }

    #[tokio::test]
    async fn password_reset_round_trip() {
        let (users, outbox) = service();
        users.create_user("ann@example.com", "old").await.unwrap();
        users.reset_password("ann@example.com").await.unwrap();

        let (mail, token) = outbox.sent.lock().await[0].clone();
        assert_eq!(mail, "ann@example.com");

        users.set_new_password(token, "new").await.unwrap();
        users.authenticate("ann@example.com", "new").await.unwrap();
        assert!(matches!(
            users.set_new_password(token, "again").await,
            Err(CinemaError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn reset_for_unknown_mail_is_not_found() {
        let (users, outbox) = service();
        assert!(matches!(
            users.reset_password("ghost@example.com").await,
            Err(CinemaError::UserNotFound)
        ));
        assert!(outbox.sent.lock().await.is_empty());
    }
}
