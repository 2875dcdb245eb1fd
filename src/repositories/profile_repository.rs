use std::sync::Arc;
use uuid::Uuid;

use crate::backend::{first_row, select_as, to_row, Filter, Query, TableStore};
use crate::models::organization::Organization;
use crate::models::user::ProfileRow;
use crate::utils::errors::AppResult;

pub const PROFILES: &str = "profiles";
pub const ORGANIZATIONS: &str = "organizations";

pub struct ProfileRepository {
    store: Arc<dyn TableStore>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn find(&self, id: Uuid) -> AppResult<Option<ProfileRow>> {
        let query = Query::filtered(Filter::new().eq("id", id)).limit(1);
        let rows: Vec<ProfileRow> = select_as(self.store.as_ref(), PROFILES, &query).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert(&self, profile: &ProfileRow) -> AppResult<ProfileRow> {
        let rows = self.store.insert(PROFILES, vec![to_row(profile)?]).await?;
        first_row(PROFILES, rows)
    }
}

pub struct OrganizationRepository {
    store: Arc<dyn TableStore>,
}

impl OrganizationRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn find(&self, id: Uuid) -> AppResult<Option<Organization>> {
        let query = Query::filtered(Filter::new().eq("id", id)).limit(1);
        let rows: Vec<Organization> = select_as(self.store.as_ref(), ORGANIZATIONS, &query).await?;
        Ok(rows.into_iter().next())
    }
}
