//! Transfers, administrative reset and balance queries over quota items.

use super::generator::{GenerationReport, generate_for_titular_in, generate_in};
use super::QuotaBalance;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::ids::{MemberId, QuotaItemId};
use crate::member::{Actor, Member};
use crate::model::{QuotaItem, Request, Transfer};
use crate::period::Period;
use crate::state::{QuotaItemState, StateMachine};
use crate::storage::{Storage, Transaction, require_member, require_quota_item};
use serde::{Deserialize, Serialize};

/// A quota item with its holder, titular and the requests that used it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaItemDetails {
    /// The item, including its transfer record and validity window
    pub item: QuotaItem,
    /// Current holder
    pub holder: Member,
    /// Owning titular
    pub titular: Member,
    /// Every request that ever referenced the item
    pub requests: Vec<Request>,
}

/// Outcome of an administrative reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    /// Items deleted
    pub items_deleted: usize,
    /// Items kept because an active request references them
    pub items_kept: usize,
    /// Aggregates deleted
    pub aggregates_deleted: usize,
    /// Regeneration that followed the deletion
    pub regenerated: GenerationReport,
}

/// Transfer, reset and balance operations.
pub struct QuotaAllocation<S> {
    env: Environment<S>,
}

impl<S> Clone for QuotaAllocation<S> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
        }
    }
}

impl<S: Storage> QuotaAllocation<S> {
    /// Create the allocation service.
    #[must_use]
    pub const fn new(env: Environment<S>) -> Self {
        Self { env }
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Hand a DISPONIBLE, non-vencido item to an alternate of its titular.
    ///
    /// The caller must be the current holder, an alternate of the titular,
    /// the titular's delegate, or an administrator. An item is transferred
    /// at most once; the origin holder is recorded.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the item or the new holder does not exist
    /// - [`Error::Forbidden`] if the caller lacks standing
    /// - [`Error::InvalidState`] if the item is consumed, vencido or already transferred
    /// - [`Error::Validation`] if the new holder is not an alternate of the titular
    pub async fn transfer(
        &self,
        actor: &Actor,
        item_id: QuotaItemId,
        new_holder: MemberId,
        reason: &str,
    ) -> Result<QuotaItem> {
        self.env
            .bounded(self.transfer_tx(actor, item_id, new_holder, reason))
            .await
    }

    async fn transfer_tx(
        &self,
        actor: &Actor,
        item_id: QuotaItemId,
        new_holder: MemberId,
        reason: &str,
    ) -> Result<QuotaItem> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::Validation("a transfer needs a reason".into()));
        }

        let mut tx = self.env.storage().begin().await?;
        let mut item = require_quota_item(&mut tx, item_id).await?;

        let titular = require_member(&mut tx, item.titular).await?;
        let acting = tx.member(actor.member_id).await?;
        let has_standing = actor.is_administrator()
            || actor.member_id == item.holder
            || titular.delegate == Some(actor.member_id)
            || acting.as_ref().is_some_and(|m| m.is_alternate_of(item.titular));
        if !has_standing {
            return Err(Error::Forbidden(format!(
                "member {} cannot transfer quota item {}",
                actor.member_id, item.id
            )));
        }

        let target = require_member(&mut tx, new_holder).await?;
        if !target.is_alternate_of(item.titular) || !target.active {
            return Err(Error::Validation(format!(
                "{} is not an active alternate of the item's titular",
                target.full_name
            )));
        }

        let event = self.hand_over(&mut item, new_holder, reason)?;
        tx.save_quota_item(&item).await?;
        tx.commit().await?;

        self.env.publish([event]);
        Ok(item)
    }

    /// An alternate takes one of its titular's items for itself.
    ///
    /// At most one taken or transferred item per alternate per period.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] if the caller is not an alternate of the titular
    /// - [`Error::InvalidState`] if the item cannot be transferred or the
    ///   alternate already holds an item for the period
    pub async fn take(&self, actor: &Actor, item_id: QuotaItemId) -> Result<QuotaItem> {
        self.env.bounded(self.take_tx(actor, item_id)).await
    }

    async fn take_tx(&self, actor: &Actor, item_id: QuotaItemId) -> Result<QuotaItem> {
        let mut tx = self.env.storage().begin().await?;
        let mut item = require_quota_item(&mut tx, item_id).await?;

        let alternate = require_member(&mut tx, actor.member_id).await?;
        if !alternate.is_alternate_of(item.titular) {
            return Err(Error::Forbidden(
                "only an alternate of the titular may take this item".into(),
            ));
        }

        let already_held = tx
            .quota_items_held_by(alternate.id, item.period)
            .await?
            .iter()
            .any(QuotaItem::is_transferred);
        if already_held {
            return Err(Error::InvalidState(format!(
                "{} already holds a quota item for {}",
                alternate.full_name, item.period
            )));
        }

        let event = self.hand_over(&mut item, alternate.id, "taken by alternate")?;
        tx.save_quota_item(&item).await?;
        tx.commit().await?;

        self.env.publish([event]);
        Ok(item)
    }

    /// Return a transferred, still DISPONIBLE item to its titular. Admin only.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] unless the caller holds the admin role
    /// - [`Error::InvalidState`] if the item was not transferred or is consumed
    pub async fn revert_transfer(&self, actor: &Actor, item_id: QuotaItemId) -> Result<QuotaItem> {
        actor.require_admin("reverting a transfer")?;
        self.env.bounded(self.revert_transfer_tx(item_id)).await
    }

    async fn revert_transfer_tx(&self, item_id: QuotaItemId) -> Result<QuotaItem> {
        let mut tx = self.env.storage().begin().await?;
        let mut item = require_quota_item(&mut tx, item_id).await?;

        if !item.is_transferred() {
            return Err(Error::InvalidState(format!(
                "quota item {} was not transferred",
                item.label
            )));
        }
        if item.state != QuotaItemState::Disponible {
            return Err(Error::InvalidState(format!(
                "quota item {} is {} and cannot be returned",
                item.label,
                item.state.as_str()
            )));
        }

        let previous = item.holder;
        item.holder = item.titular;
        item.transfer = None;
        tx.save_quota_item(&item).await?;
        tx.commit().await?;

        tracing::info!(item_id = %item.id, from = %previous, "Quota transfer reverted");
        self.env.publish([LifecycleEvent::QuotaItemTransferred {
            item_id: item.id,
            from: previous,
            to: item.titular,
            reason: "transfer reverted".into(),
        }]);
        Ok(item)
    }

    fn hand_over(
        &self,
        item: &mut QuotaItem,
        new_holder: MemberId,
        reason: &str,
    ) -> Result<LifecycleEvent> {
        let now = self.env.now();
        if item.state != QuotaItemState::Disponible {
            return Err(Error::InvalidState(format!(
                "quota item {} is {} and cannot be transferred",
                item.label,
                item.state.as_str()
            )));
        }
        if item.is_expired(now, self.env.policy().expiry_grace) {
            return Err(Error::InvalidState(format!("quota item {} is vencido", item.label)));
        }
        if item.is_transferred() {
            return Err(Error::InvalidState(format!(
                "quota item {} was already transferred",
                item.label
            )));
        }
        if item.holder == new_holder {
            return Err(Error::Validation("the member already holds this item".into()));
        }

        let from = item.holder;
        item.holder = new_holder;
        item.transfer = Some(Transfer {
            from,
            at: now,
            reason: reason.to_string(),
        });

        tracing::info!(item_id = %item.id, %from, to = %new_holder, "Quota item transferred");
        metrics::counter!("pasajes.quota.transfers").increment(1);
        Ok(LifecycleEvent::QuotaItemTransferred {
            item_id: item.id,
            from,
            to: new_holder,
            reason: reason.to_string(),
        })
    }

    // ========================================================================
    // Generation and reset
    // ========================================================================

    /// Generate the period for the titular whose quota `member` draws on.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the member does not exist
    /// - [`Error::Validation`] if the member has no entitlement
    pub async fn ensure_for_member(
        &self,
        member: MemberId,
        year: i32,
        month: u32,
    ) -> Result<GenerationReport> {
        let period = Period::new(year, month)?;
        self.env.bounded(self.ensure_tx(member, period)).await
    }

    async fn ensure_tx(&self, member: MemberId, period: Period) -> Result<GenerationReport> {
        let mut tx = self.env.storage().begin().await?;
        let member = require_member(&mut tx, member).await?;
        let owner = member.quota_owner().ok_or_else(|| {
            Error::Validation(format!("{} has no quota entitlement", member.full_name))
        })?;
        let titular = require_member(&mut tx, owner).await?;
        if !titular.active {
            return Err(Error::Validation(format!("{} is not active", titular.full_name)));
        }

        tx.lock_period(period).await?;
        let report = generate_for_titular_in(
            &mut tx,
            &titular,
            period,
            &period.weekly_windows(),
            self.env.policy(),
            self.env.now(),
        )
        .await?;
        tx.commit().await?;
        Ok(report)
    }

    /// Delete every item of the period not referenced by an active request,
    /// drop emptied aggregates and regenerate. Admin only.
    ///
    /// Runs in one transaction; a failure leaves the period as it was.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] unless the caller holds the admin role
    /// - [`Error::Validation`] for an invalid month
    pub async fn reset_for_month(&self, actor: &Actor, year: i32, month: u32) -> Result<ResetReport> {
        actor.require_admin("resetting a quota period")?;
        let period = Period::new(year, month)?;
        self.env.bounded(self.reset_tx(period)).await
    }

    async fn reset_tx(&self, period: Period) -> Result<ResetReport> {
        let mut tx = self.env.storage().begin().await?;
        tx.lock_period(period).await?;

        let mut report = ResetReport::default();
        for aggregate in tx.quota_aggregates(period).await? {
            let mut kept = 0;
            for item in tx.quota_items(aggregate.id).await? {
                let referenced = tx
                    .requests_for_quota_item(item.id)
                    .await?
                    .iter()
                    .any(Request::holds_quota);
                if referenced || item.state != QuotaItemState::Disponible {
                    kept += 1;
                } else {
                    tx.delete_quota_item(item.id).await?;
                    report.items_deleted += 1;
                }
            }
            report.items_kept += kept;
            if kept == 0 {
                tx.delete_quota_aggregate(aggregate.id).await?;
                report.aggregates_deleted += 1;
            }
        }

        report.regenerated = generate_in(&mut tx, period, self.env.policy(), self.env.now()).await?;
        tx.commit().await?;

        tracing::warn!(
            %period,
            items_deleted = report.items_deleted,
            items_kept = report.items_kept,
            items_regenerated = report.regenerated.items_created,
            "Quota period reset"
        );
        Ok(report)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Balance of a titular for a period, recomputed from the items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no quota was generated for the titular.
    pub async fn balance(&self, titular: MemberId, year: i32, month: u32) -> Result<QuotaBalance> {
        let period = Period::new(year, month)?;
        self.env.read(|| self.balance_once(titular, period)).await
    }

    async fn balance_once(&self, titular: MemberId, period: Period) -> Result<QuotaBalance> {
        let mut tx = self.env.storage().begin().await?;
        let aggregate = tx
            .quota_aggregate(titular, period)
            .await?
            .ok_or_else(|| Error::not_found("quota aggregate", format!("{titular}/{period}")))?;
        let items = tx.quota_items(aggregate.id).await?;
        tx.commit().await?;

        Ok(QuotaBalance::from_items(
            &aggregate,
            &items,
            self.env.policy(),
            self.env.now(),
        ))
    }

    /// A fully-loaded quota item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the item does not exist.
    pub async fn item_details(&self, item_id: QuotaItemId) -> Result<QuotaItemDetails> {
        self.env.read(|| self.item_details_once(item_id)).await
    }

    async fn item_details_once(&self, item_id: QuotaItemId) -> Result<QuotaItemDetails> {
        let mut tx = self.env.storage().begin().await?;
        let item = require_quota_item(&mut tx, item_id).await?;
        let holder = require_member(&mut tx, item.holder).await?;
        let titular = require_member(&mut tx, item.titular).await?;
        let requests = tx.requests_for_quota_item(item.id).await?;
        tx.commit().await?;

        Ok(QuotaItemDetails {
            item,
            holder,
            titular,
            requests,
        })
    }

    /// Items currently held by `holder` in a period.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid month.
    pub async fn items_held_by(
        &self,
        holder: MemberId,
        year: i32,
        month: u32,
    ) -> Result<Vec<QuotaItem>> {
        let period = Period::new(year, month)?;
        self.env
            .read(|| async move {
                let mut tx = self.env.storage().begin().await?;
                let items = tx.quota_items_held_by(holder, period).await?;
                tx.commit().await?;
                Ok(items)
            })
            .await
    }
}
