use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::db::entities::user;
use crate::error::Result;
use crate::services::session::SessionSigner;
use crate::services::spotify::{RawProfile, TokenGrant};

pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_key(&self, key: &str) -> Result<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Key.eq(key))
            .one(&self.db)
            .await?)
    }

    pub async fn find_by_spotify_id(&self, spotify_id: &str) -> Result<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::SpotifyId.eq(spotify_id))
            .one(&self.db)
            .await?)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }

    /// Users eligible for background token renewal at startup.
    pub async fn all_with_token_expiry(&self) -> Result<Vec<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::TokenExpires.is_not_null())
            .all(&self.db)
            .await?)
    }

    /// Upsert keyed on the stable upstream identity. First sight creates a
    /// row with a fresh opaque session key; later callbacks update tokens and
    /// profile fields in place and keep the existing key.
    pub async fn get_or_create(
        &self,
        profile: &RawProfile,
        grant: &TokenGrant,
    ) -> Result<user::Model> {
        let now = Utc::now();
        let token_expires = now + Duration::seconds(grant.expires_in);
        let image = profile.images.first().map(|i| i.url.clone());
        let follower_count = profile
            .followers
            .as_ref()
            .and_then(|f| f.total)
            .unwrap_or(0);

        if let Some(existing) = self.find_by_spotify_id(&profile.id).await? {
            let mut active: user::ActiveModel = existing.into();
            active.display_name = Set(profile.display_name.clone());
            active.email = Set(profile.email.clone());
            active.country = Set(profile.country.clone());
            active.uri = Set(profile.uri.clone());
            active.image = Set(image);
            active.product = Set(profile.product.clone());
            active.follower_count = Set(follower_count);
            active.access_token = Set(Some(grant.access_token.clone()));
            if let Some(refresh_token) = &grant.refresh_token {
                active.refresh_token = Set(Some(refresh_token.clone()));
            }
            active.token_expires = Set(Some(token_expires.into()));
            active.updated_at = Set(now.into());
            return Ok(active.update(&self.db).await?);
        }

        let new_user = user::ActiveModel {
            key: Set(SessionSigner::generate_key()),
            spotify_id: Set(profile.id.clone()),
            display_name: Set(profile.display_name.clone()),
            email: Set(profile.email.clone()),
            country: Set(profile.country.clone()),
            uri: Set(profile.uri.clone()),
            image: Set(image),
            product: Set(profile.product.clone()),
            follower_count: Set(follower_count),
            access_token: Set(Some(grant.access_token.clone())),
            refresh_token: Set(grant.refresh_token.clone()),
            token_expires: Set(Some(token_expires.into())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        Ok(new_user.insert(&self.db).await?)
    }

    /// Persist a refresh-token grant: new access token, rotated refresh token
    /// when upstream sends one, and `token_expires = now + expires_in`.
    pub async fn apply_refresh(
        &self,
        user: user::Model,
        grant: &TokenGrant,
    ) -> Result<user::Model> {
        let now = Utc::now();
        let mut active: user::ActiveModel = user.into();
        active.access_token = Set(Some(grant.access_token.clone()));
        if let Some(refresh_token) = &grant.refresh_token {
            active.refresh_token = Set(Some(refresh_token.clone()));
        }
        active.token_expires = Set(Some((now + Duration::seconds(grant.expires_in)).into()));
        active.updated_at = Set(now.into());
        Ok(active.update(&self.db).await?)
    }
}
