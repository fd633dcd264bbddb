//! [`UserDirectory`] over the `users` table REST endpoint.

use fittrack_directory::{DirectoryError, UserDirectory};
use fittrack_model::{NewUserRecord, Role, UserId, UserPatch, UserRecord};
use reqwest::{Method, RequestBuilder};
use serde::de::IgnoredAny;
use serde_json::json;

use crate::client::{RawResponse, RestClient, SessionSlot};
use crate::wire;

const USERS: &str = "/rest/v1/users";

/// Column definitions passed to the `create_table_if_not_exists` RPC.
const USERS_TABLE_DEFINITION: &str = "
    id UUID PRIMARY KEY REFERENCES auth.users(id) ON DELETE CASCADE,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'customer' CHECK (role IN ('admin', 'customer')),
    name TEXT,
    avatar_url TEXT,
    is_suspended BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW() NOT NULL
";

/// The hosted `users` table.
///
/// Requests carry the signed-in user's access token, so row-level security
/// applies exactly as it would for that user.
pub struct HostedDirectory {
    client: RestClient,
    session: SessionSlot,
}

impl HostedDirectory {
    pub(crate) fn new(client: RestClient, session: SessionSlot) -> Self {
        Self { client, session }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let token = self.session.access_token();
        self.client.request(method, path, token.as_deref())
    }

    async fn send(
        &self,
        request: RequestBuilder,
        id: Option<UserId>,
        email: Option<&str>,
    ) -> Result<RawResponse, DirectoryError> {
        let response = self.client.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(wire::classify_rest_error(response.status, &response.body, id, email))
        }
    }

    /// Parses a `return=representation` body and takes the single row.
    fn single_row(id: UserId, body: &str) -> Result<UserRecord, DirectoryError> {
        wire::parse_json::<Vec<UserRecord>>(body)?
            .into_iter()
            .next()
            .ok_or(DirectoryError::NotFound(id))
    }
}

fn by_id(id: UserId) -> String {
    format!("{USERS}?id=eq.{id}")
}

impl UserDirectory for HostedDirectory {
    async fn ensure_schema(&self) -> Result<(), DirectoryError> {
        let request = self
            .request(Method::POST, "/rest/v1/rpc/create_table_if_not_exists")
            .json(&json!({
                "table_name": "users",
                "table_definition": USERS_TABLE_DEFINITION,
            }));
        self.send(request, None, None).await?;
        tracing::debug!("users table ensured");
        Ok(())
    }

    async fn select_by_id(&self, id: UserId) -> Result<UserRecord, DirectoryError> {
        let request = self.request(Method::GET, &format!("{}&select=*", by_id(id)));
        let response = self.send(request, Some(id), None).await?;
        Self::single_row(id, &response.body)
    }

    async fn insert(&self, record: NewUserRecord) -> Result<UserRecord, DirectoryError> {
        let (id, email) = (record.id, record.email.clone());
        let request = self
            .request(Method::POST, USERS)
            .header("Prefer", "return=representation")
            .json(&[record]);
        let response = self.send(request, Some(id), Some(email.as_str())).await?;
        Self::single_row(id, &response.body)
    }

    async fn update_by_id(&self, id: UserId, patch: UserPatch) -> Result<(), DirectoryError> {
        if patch.is_empty() {
            return self.select_by_id(id).await.map(|_| ());
        }
        let request = self
            .request(Method::PATCH, &by_id(id))
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = self.send(request, Some(id), None).await?;
        Self::single_row(id, &response.body).map(|_| ())
    }

    async fn delete_by_id(&self, id: UserId) -> Result<(), DirectoryError> {
        let request = self
            .request(Method::DELETE, &by_id(id))
            .header("Prefer", "return=representation");
        let response = self.send(request, Some(id), None).await?;
        Self::single_row(id, &response.body).map(|_| ())
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        let request = self.request(Method::GET, &format!("{USERS}?select=*&order=created_at.desc"));
        let response = self.send(request, None, None).await?;
        Ok(wire::parse_json(&response.body)?)
    }

    async fn exists_with_role(&self, role: Role) -> Result<bool, DirectoryError> {
        let path = format!("{USERS}?select=id&role=eq.{role}&limit=1");
        let response = self.send(self.request(Method::GET, &path), None, None).await?;
        let rows: Vec<IgnoredAny> = wire::parse_json(&response.body)?;
        Ok(!rows.is_empty())
    }
}
