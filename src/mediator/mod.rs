/*
 * This file is part of the Taskflow backend.
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::context::RequestContext;
use crate::common::error::FriendlyError;
use crate::events::outbox::{NewOutboxEvent, OutboxRepository};

/// Marker for anything the mediator can dispatch. Commands mutate state and
/// run inside the transactional pipeline below; queries implement
/// [`Query`] instead and skip both the transaction and the outbox.
pub trait Command: Send {
    type Output: Send;
}

pub trait Query: Send {
    type Output: Send;
}

/// One handler per command type. `authorize` runs before the transaction
/// opens -- a rejected command never touches the database. `execute` runs
/// inside the transaction and returns both the result and the domain
/// events the command produced; the mediator writes those events to the
/// outbox in the same transaction before committing.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn authorize(&self, ctx: &RequestContext, cmd: &C) -> Result<(), FriendlyError>;

    async fn execute(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: &RequestContext,
        cmd: C,
    ) -> Result<(C::Output, Vec<NewOutboxEvent>), FriendlyError>;
}

#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn execute(&self, ctx: &RequestContext, query: Q) -> Result<Q::Output, FriendlyError>;
}

/// Routes a command or query to its one handler. Commands get
/// schema-validate (the caller's `ValidJson`/`UserInput` extractor already
/// did this before the handler runs) -> authorize -> begin transaction ->
/// execute -> flush outbox -> commit -> return DTO. Queries go straight to
/// their handler.
pub struct Mediator {
    pool: PgPool,
    outbox: Arc<dyn OutboxRepository>,
}

impl Mediator {
    pub fn new(pool: PgPool, outbox: Arc<dyn OutboxRepository>) -> Self {
        Self { pool, outbox }
    }

    pub async fn dispatch<C: Command>(
        &self,
        handler: &(impl CommandHandler<C> + ?Sized),
        ctx: &RequestContext,
        cmd: C,
    ) -> Result<C::Output, FriendlyError> {
        handler.authorize(ctx, &cmd).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FriendlyError::internal("mediator", format!("failed to begin transaction: {e}")))?;

        let (output, events) = handler.execute(&mut tx, ctx, cmd).await?;

        for event in events {
            self.outbox
                .insert_in_tx(&mut tx, event)
                .await
                .map_err(|e| FriendlyError::internal("mediator", format!("failed to write outbox row: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| FriendlyError::internal("mediator", format!("failed to commit transaction: {e}")))?;

        Ok(output)
    }

    pub async fn query<Q: Query>(&self, handler: &(impl QueryHandler<Q> + ?Sized), ctx: &RequestContext, query: Q) -> Result<Q::Output, FriendlyError> {
        handler.execute(ctx, query).await
    }
}
