//! Expense-liquidation linkage.
//!
//! Approving a liquidation finalizes its request; reverting the approval
//! reverts the finalization. The two sides live in separate transactions:
//! the liquidation step commits first, then the request step runs with
//! bounded retries. Both steps are idempotent, so an operator (or the
//! caller) recovers from [`Error::LinkageIncomplete`] by re-running the
//! same liquidation operation.

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::ids::{LiquidationId, RequestId};
use crate::member::Actor;
use crate::model::{Liquidation, Request};
use crate::requests::RequestEngine;
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::sequence::{DocumentType, format_code, next_in};
use crate::state::{LiquidationStatus, RequestStatus, StateMachine};
use crate::storage::{
    Storage, Transaction, require_liquidation, require_member, require_request,
};
use chrono::Datelike;
use std::future::Future;

/// Submission and approval of liquidations, kept in step with requests.
pub struct LiquidationLinkage<S> {
    env: Environment<S>,
    requests: RequestEngine<S>,
    retry: RetryPolicy,
}

impl<S> Clone for LiquidationLinkage<S> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
            requests: self.requests.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<S: Storage> LiquidationLinkage<S> {
    /// Create the linkage with the default request-step retry policy.
    #[must_use]
    pub fn new(env: Environment<S>) -> Self {
        Self {
            requests: RequestEngine::new(env.clone()),
            env,
            retry: RetryPolicy::linkage(),
        }
    }

    /// Override the retry policy of the request step.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Submit the liquidation of an EMITIDO request, issuing its `DES` code.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] if the actor may not act for the beneficiary
    /// - [`Error::InvalidState`] if the request is not EMITIDO or already
    ///   has a liquidation
    pub async fn submit(&self, actor: &Actor, request_id: RequestId) -> Result<Liquidation> {
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let request = require_request(&mut tx, request_id).await?;
                let beneficiary = require_member(&mut tx, request.beneficiary).await?;
                if !beneficiary.can_be_represented_by(actor) && actor.member_id != request.requester
                {
                    return Err(Error::Forbidden(format!(
                        "member {} cannot submit the liquidation of {}",
                        actor.member_id, request.code
                    )));
                }
                if request.status != RequestStatus::Emitido {
                    return Err(Error::InvalidState(format!(
                        "request {} is {}; only EMITIDO requests are liquidated",
                        request.code,
                        request.status.as_str()
                    )));
                }
                if tx.liquidation_for_request(request.id).await?.is_some() {
                    return Err(Error::InvalidState(format!(
                        "request {} already has a liquidation",
                        request.code
                    )));
                }

                let now = self.env.now();
                let year = now.year();
                let value = next_in(&mut tx, year, DocumentType::Liquidation).await?;
                let liquidation = Liquidation {
                    id: LiquidationId::new(),
                    code: format_code(DocumentType::Liquidation, year, value),
                    request_id: request.id,
                    status: LiquidationStatus::EnRevision,
                    submitted_by: actor.member_id,
                    approved_by: None,
                    approved_at: None,
                    created_at: now,
                    updated_at: now,
                };
                tx.save_liquidation(&liquidation).await?;
                tx.commit().await?;

                tracing::info!(
                    liquidation_id = %liquidation.id,
                    code = %liquidation.code,
                    request_code = %request.code,
                    "Liquidation submitted"
                );
                Ok(liquidation)
            })
            .await
    }

    /// Approve a liquidation and finalize its request. Administrators only.
    ///
    /// Re-running on an APROBADO liquidation whose request is not yet
    /// FINALIZADO completes the request step.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if both sides are already approved/finalized,
    ///   or the request is neither EMITIDO nor FINALIZADO
    /// - [`Error::LinkageIncomplete`] if the request step still fails after
    ///   retries; the liquidation stays APROBADO
    pub async fn approve(&self, actor: &Actor, id: LiquidationId) -> Result<Liquidation> {
        actor.require_administrator("approving a liquidation")?;

        let (liquidation, changed) = self
            .env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut liquidation = require_liquidation(&mut tx, id).await?;
                let request = require_request(&mut tx, liquidation.request_id).await?;

                let changed = match (liquidation.status, request.status) {
                    (LiquidationStatus::EnRevision, RequestStatus::Emitido | RequestStatus::Finalizado) => {
                        let now = self.env.now();
                        liquidation.status = liquidation.status.transition(LiquidationStatus::Aprobado)?;
                        liquidation.approved_by = Some(actor.member_id);
                        liquidation.approved_at = Some(now);
                        liquidation.updated_at = now;
                        tx.save_liquidation(&liquidation).await?;
                        true
                    }
                    (LiquidationStatus::Aprobado, RequestStatus::Emitido) => false,
                    (LiquidationStatus::Aprobado, RequestStatus::Finalizado) => {
                        return Err(Error::InvalidState(format!(
                            "liquidation {} is already approved",
                            liquidation.code
                        )));
                    }
                    (_, other) => {
                        return Err(Error::InvalidState(format!(
                            "request {} is {} and cannot be finalized",
                            request.code,
                            other.as_str()
                        )));
                    }
                };
                tx.commit().await?;
                Ok((liquidation, changed))
            })
            .await?;

        let (_, finalized) = self
            .complete(&liquidation, "approve", || {
                self.requests.finalize_tracked(actor, liquidation.request_id)
            })
            .await?;

        tracing::info!(
            liquidation_id = %liquidation.id,
            request_id = %liquidation.request_id,
            resumed = !changed,
            "Liquidation approved"
        );
        if changed || finalized {
            self.env.publish([LifecycleEvent::LiquidationApproved {
                liquidation_id: liquidation.id,
                request_id: liquidation.request_id,
            }]);
        }
        Ok(liquidation)
    }

    /// Return an APROBADO liquidation to EN_REVISION and revert the request
    /// to EMITIDO. Administrators only.
    ///
    /// Re-running on an EN_REVISION liquidation whose request is still
    /// FINALIZADO completes the request step.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the liquidation is not approved and its
    ///   request not finalized
    /// - [`Error::LinkageIncomplete`] if the request step still fails after
    ///   retries; the liquidation stays EN_REVISION
    pub async fn revert_approval(&self, actor: &Actor, id: LiquidationId) -> Result<Liquidation> {
        actor.require_administrator("reverting a liquidation approval")?;

        let (liquidation, changed) = self
            .env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut liquidation = require_liquidation(&mut tx, id).await?;
                let request = require_request(&mut tx, liquidation.request_id).await?;

                let changed = match (liquidation.status, request.status) {
                    (LiquidationStatus::Aprobado, _) => {
                        liquidation.status =
                            liquidation.status.transition(LiquidationStatus::EnRevision)?;
                        liquidation.approved_by = None;
                        liquidation.approved_at = None;
                        liquidation.updated_at = self.env.now();
                        tx.save_liquidation(&liquidation).await?;
                        true
                    }
                    (LiquidationStatus::EnRevision, RequestStatus::Finalizado) => false,
                    (LiquidationStatus::EnRevision, _) => {
                        return Err(Error::InvalidState(format!(
                            "liquidation {} is not approved",
                            liquidation.code
                        )));
                    }
                };
                tx.commit().await?;
                Ok((liquidation, changed))
            })
            .await?;

        let (_, reverted) = self
            .complete(&liquidation, "revert_approval", || {
                self.requests
                    .revert_finalize_tracked(actor, liquidation.request_id)
            })
            .await?;

        tracing::info!(
            liquidation_id = %liquidation.id,
            request_id = %liquidation.request_id,
            resumed = !changed,
            "Liquidation approval reverted"
        );
        if changed || reverted {
            self.env.publish([LifecycleEvent::LiquidationApprovalReverted {
                liquidation_id: liquidation.id,
                request_id: liquidation.request_id,
            }]);
        }
        Ok(liquidation)
    }

    /// Load a liquidation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if it does not exist.
    pub async fn get(&self, id: LiquidationId) -> Result<Liquidation> {
        self.env
            .read(|| async move {
                let mut tx = self.env.storage().begin().await?;
                let liquidation = require_liquidation(&mut tx, id).await?;
                tx.commit().await?;
                Ok(liquidation)
            })
            .await
    }

    /// The liquidation of a request, if one was submitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on backend failure.
    pub async fn for_request(&self, request_id: RequestId) -> Result<Option<Liquidation>> {
        self.env
            .read(|| async move {
                let mut tx = self.env.storage().begin().await?;
                let liquidation = tx.liquidation_for_request(request_id).await?;
                tx.commit().await?;
                Ok(liquidation)
            })
            .await
    }

    /// Run the request step with retries; surface a failure with both ids.
    async fn complete<F, Fut>(
        &self,
        liquidation: &Liquidation,
        operation: &'static str,
        step: F,
    ) -> Result<(Request, bool)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(Request, bool)>>,
    {
        match retry_with_predicate(self.retry.clone(), step, Error::is_transient).await {
            Ok(done) => Ok(done),
            Err(source) => {
                metrics::counter!(
                    "pasajes.liquidation.compensation_failures",
                    "operation" => operation
                )
                .increment(1);
                tracing::warn!(
                    liquidation_id = %liquidation.id,
                    request_id = %liquidation.request_id,
                    operation,
                    error = %source,
                    "Liquidation committed but request step failed; re-run to complete"
                );
                Err(Error::LinkageIncomplete {
                    liquidation_id: liquidation.id,
                    request_id: liquidation.request_id,
                    source: Box::new(source),
                })
            }
        }
    }
}
