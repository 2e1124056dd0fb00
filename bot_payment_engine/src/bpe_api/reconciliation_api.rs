//! The reconciliation core.
//!
//! Charges are opened with [`ReconciliationApi::initialize_charge`]. Confirmation can then arrive three ways: the
//! payer's browser returning from checkout ([`ReconciliationApi::verify_reference`]), the frontend's own report
//! ([`ReconciliationApi::frontend_callback`]) or the gateway's signed webhook ([`ReconciliationApi::handle_webhook`]).
//! All three are reduced to a [`PaymentEvent`] and run through one algorithm, so the same payment reported twice, or
//! by two paths at once, is only ever granted once.
//!
//! Amounts are never taken from the client. The gateway's verification answer decides whether money moved and how
//! much.
use std::{fmt::Debug, future::Future, time::Duration};

use chrono::Utc;
use log::*;
use tokio::sync::Mutex;

use crate::{
    bpe_api::{
        entitlement::{
            compute_split,
            entitlement_for,
            expected_price,
            guard_duplicate_pending,
            guard_duplicate_purchase,
            parse_payment_type,
            validate_amount,
        },
        errors::ReconciliationError,
        payment_objects::{
            CallbackClaim,
            ChargeInitRequest,
            EventSource,
            InitializedCharge,
            PaymentEvent,
            ReconcileOutcome,
            Synthesis,
            WebhookAck,
            PAYMENT_CHANNEL,
        },
    },
    db_types::{
        MinorUnits,
        NewSale,
        NewTransaction,
        PaymentType,
        PayoutProfile,
        Principal,
        RevenueSplit,
        Transaction,
        TransactionStatus,
    },
    helpers::{catch_panic, new_reference},
    traits::{
        ChargeRequest,
        ChargeStatus,
        GatewayError,
        InsertTransactionResult,
        LedgerStore,
        LedgerUnit,
        PaymentGateway,
        VerifiedCharge,
        WebhookEvent,
    },
};

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ReconciliationApi<B, G> {
    db: B,
    gateway: G,
    gateway_timeout: Duration,
    // Serializes lazy subaccount creation so that two first charges for the same admin do not register twice.
    subaccount_lock: Mutex<()>,
}

impl<B, G> Debug for ReconciliationApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi (gateway timeout: {:?})", self.gateway_timeout)
    }
}

impl<B, G> ReconciliationApi<B, G> {
    pub fn new(db: B, gateway: G) -> Self {
        Self { db, gateway, gateway_timeout: DEFAULT_GATEWAY_TIMEOUT, subaccount_lock: Mutex::new(()) }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> ReconciliationApi<B, G>
where
    B: LedgerStore,
    G: PaymentGateway,
{
    /// Records a `pending` transaction for the caller and opens the charge with the gateway.
    ///
    /// The transaction is written before the gateway is contacted. If the gateway call fails the pending record is
    /// left in place; the payer can retry with the returned reference or mark it failed.
    pub async fn initialize_charge(
        &self,
        principal: &Principal,
        request: ChargeInitRequest,
    ) -> Result<InitializedCharge, ReconciliationError> {
        let payment_type = parse_payment_type(&request.payment_type)?;
        if !request.amount.is_positive() {
            return Err(ReconciliationError::InvalidInput("Amount must be greater than zero".into()));
        }
        let bot = self
            .db
            .fetch_bot(request.bot_id)
            .await?
            .ok_or_else(|| ReconciliationError::NotFound(format!("Bot #{}", request.bot_id)))?;
        validate_amount(request.amount, expected_price(&bot, payment_type))?;
        let user_id = principal.user_id;
        if payment_type == PaymentType::Purchase {
            let prior =
                self.db.find_transaction(user_id, bot.id, PaymentType::Purchase, TransactionStatus::Success).await?;
            guard_duplicate_purchase(user_id, &bot, prior.as_ref())?;
        }
        let pending = self.db.find_transaction(user_id, bot.id, payment_type, TransactionStatus::Pending).await?;
        guard_duplicate_pending(pending.as_ref())?;

        let profile = self.payout_profile_for(bot.owner_id).await?;
        let split = RevenueSplit::new(request.amount, compute_split(profile.as_ref(), payment_type));
        let reference = new_reference(user_id);
        let description =
            request.description.unwrap_or_else(|| format!("{payment_type} of {} (bot #{})", bot.name, bot.id));
        let new_tx = NewTransaction {
            user_id,
            admin_id: bot.owner_id,
            bot_id: bot.id,
            amount: request.amount,
            split,
            reference: reference.clone(),
            payment_channel: PAYMENT_CHANNEL.to_string(),
            payment_type,
            description,
        };
        let transaction = self.db.insert_pending_transaction(new_tx).await?;
        debug!("💳️ Pending {payment_type} [{reference}] recorded for user #{user_id} on bot #{}", bot.id);

        let payout_subaccount = profile.and_then(|p| p.subaccount_code);
        let company_charge = payout_subaccount.as_ref().map(|_| split.company_share);
        let charge = ChargeRequest {
            payer_email: principal.email.clone(),
            amount: request.amount,
            reference,
            payout_subaccount,
            company_charge,
        };
        let authorization = self.gateway_call(self.gateway.initialize_charge(charge)).await.map_err(|e| {
            warn!("💳️ Could not open charge [{}] with the gateway. {e}", transaction.reference);
            e
        })?;
        info!("💳️ Charge [{}] opened for {} ({payment_type} of bot #{})", authorization.reference, request.amount, bot.id);
        Ok(InitializedCharge { transaction, authorization })
    }

    /// The redirect path. Only the payer, or a superadmin, may ask for a reference to be verified.
    pub async fn verify_reference(
        &self,
        principal: &Principal,
        reference: &str,
    ) -> Result<ReconcileOutcome, ReconciliationError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ReconciliationError::InvalidInput("A payment reference is required".into()));
        }
        let tx = self.fetch_transaction(reference).await?;
        check_payer(principal, &tx)?;
        self.reconcile(PaymentEvent::new(reference, EventSource::Redirect)).await
    }

    /// The frontend's report of a completed checkout.
    ///
    /// The claim only tells us which reference to look at. If the ledger has never seen the reference, a transaction
    /// is created from the bot's list price and the gateway-verified amount.
    pub async fn frontend_callback(
        &self,
        principal: &Principal,
        claim: CallbackClaim,
    ) -> Result<ReconcileOutcome, ReconciliationError> {
        let payment_type = parse_payment_type(&claim.payment_type)?;
        let reference = claim.reference.trim();
        if reference.is_empty() {
            return Err(ReconciliationError::InvalidInput("A payment reference is required".into()));
        }
        let event = PaymentEvent::new(reference, EventSource::Callback).with_claimed_amount(claim.claimed_amount);
        let event = match self.db.fetch_transaction_by_reference(reference).await? {
            Some(tx) => {
                check_owner(principal, &tx)?;
                if tx.bot_id != claim.bot_id || tx.payment_type != payment_type {
                    return Err(ReconciliationError::InvalidInput(format!(
                        "Transaction {reference} is a {} of bot #{}, not a {payment_type} of bot #{}",
                        tx.payment_type, tx.bot_id, claim.bot_id
                    )));
                }
                event
            },
            None => {
                debug!("💳️ Callback for unknown reference [{reference}]. It will be created if the gateway confirms it.");
                event.with_synthesis(Synthesis {
                    payer: principal.clone(),
                    bot_id: claim.bot_id,
                    payment_type,
                    description: format!("{payment_type} of bot #{}", claim.bot_id),
                })
            },
        };
        self.reconcile(event).await
    }

    /// Authenticates and processes a gateway webhook.
    ///
    /// The signature is checked over the raw bytes before anything is parsed. Once authenticated, every business
    /// outcome is acknowledged as a [`WebhookAck`]. Only failures that a redelivery could fix (the gateway being
    /// unreachable during verification, or an internal fault) are returned as errors.
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, ReconciliationError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ReconciliationError::Unauthorized("Missing webhook signature".into()))?;
        if !self.gateway.verify_webhook_signature(raw_body, signature) {
            warn!("💳️ Webhook signature verification failed. The payload is discarded.");
            return Err(ReconciliationError::Unauthorized("Invalid webhook signature".into()));
        }
        match self.gateway.decode_webhook(raw_body)? {
            WebhookEvent::Ignored { event } => {
                debug!("💳️ Ignoring '{event}' webhook");
                Ok(WebhookAck::Ignored(event))
            },
            WebhookEvent::ChargeSuccess { reference } => {
                match self.reconcile(PaymentEvent::new(reference.as_str(), EventSource::Webhook)).await {
                    Ok(outcome) => Ok(WebhookAck::Processed(outcome)),
                    Err(e @ (ReconciliationError::GatewayUnreachable(_) | ReconciliationError::InternalError(_))) => {
                        Err(e)
                    },
                    Err(e) => {
                        info!("💳️ Webhook for [{reference}] acknowledged without changes. {e}");
                        Ok(WebhookAck::Declined(e))
                    },
                }
            },
        }
    }

    /// Gives up on a pending charge. Only the payer or a superadmin may do this, and only while it is `pending`.
    pub async fn mark_failed(&self, principal: &Principal, reference: &str) -> Result<Transaction, ReconciliationError> {
        let tx = self.fetch_transaction(reference.trim()).await?;
        check_payer(principal, &tx)?;
        if tx.status != TransactionStatus::Pending {
            return Err(ReconciliationError::TransactionClosed(tx.reference));
        }
        let tx = self.db.mark_transaction_failed(&tx.reference).await?;
        info!("💳️ Transaction [{}] marked as failed by user #{}", tx.reference, principal.user_id);
        Ok(tx)
    }

    /// The common algorithm behind every confirmation path.
    async fn reconcile(&self, event: PaymentEvent) -> Result<ReconcileOutcome, ReconciliationError> {
        let reference = event.reference.as_str();
        let existing = self.db.fetch_transaction_by_reference(reference).await?;
        match &existing {
            Some(tx) if tx.status == TransactionStatus::Success => {
                debug!("💳️ [{reference}] from {} is already reconciled", event.source);
                return Ok(ReconcileOutcome::AlreadyReconciled { transaction: tx.clone() });
            },
            Some(tx) if tx.status == TransactionStatus::Failed => {
                return Err(ReconciliationError::TransactionClosed(tx.reference.clone()));
            },
            None if event.synthesis.is_none() => {
                return Err(ReconciliationError::NotFound(format!("Transaction {reference}")));
            },
            _ => {},
        }

        let verified = self.gateway_call(self.gateway.verify_charge(reference)).await?;
        if verified.reference != reference {
            return Err(ReconciliationError::GatewayRejected(format!(
                "Verification for {reference} answered for {}",
                verified.reference
            )));
        }
        if let Some(claimed) = event.claimed_amount {
            if claimed != verified.paid_amount {
                warn!(
                    "💳️ [{reference}] {} claimed {claimed} but the gateway reports {}. Using the gateway amount.",
                    event.source, verified.paid_amount
                );
            }
        }
        match verified.status {
            ChargeStatus::Success => {},
            ChargeStatus::Abandoned if existing.is_some() => {
                let transaction = self.db.mark_transaction_failed(reference).await?;
                info!("💳️ [{reference}] was abandoned at checkout and is now marked as failed");
                return Ok(ReconcileOutcome::MarkedFailed { transaction });
            },
            _ => {
                return Err(ReconciliationError::PaymentNotSuccessful {
                    reference: reference.to_string(),
                    status: verified.raw_status,
                });
            },
        }

        let synthesized = match (existing, event.synthesis) {
            (None, Some(synthesis)) => Some(self.synthesize(reference, synthesis, &verified).await?),
            _ => None,
        };
        let outcome = catch_panic(self.apply_unit(reference, verified.paid_amount, synthesized)).await??;
        Ok(outcome)
    }

    /// Builds the local record for a verified charge that the ledger has never seen.
    async fn synthesize(
        &self,
        reference: &str,
        synthesis: Synthesis,
        verified: &VerifiedCharge,
    ) -> Result<NewTransaction, ReconciliationError> {
        let Synthesis { payer, bot_id, payment_type, description } = synthesis;
        let paid_by_caller = verified
            .customer_email
            .as_deref()
            .is_some_and(|email| email.trim().eq_ignore_ascii_case(payer.email.trim()));
        if !paid_by_caller {
            warn!(
                "💳️ [{reference}] User #{} asked to record a charge the gateway attributes to {:?}. Refusing.",
                payer.user_id, verified.customer_email
            );
            return Err(ReconciliationError::Forbidden(format!("Charge {reference} was not paid by {}", payer.email)));
        }
        let bot = self
            .db
            .fetch_bot(bot_id)
            .await?
            .ok_or_else(|| ReconciliationError::NotFound(format!("Bot #{bot_id}")))?;
        let paid = verified.paid_amount;
        validate_amount(paid, expected_price(&bot, payment_type))?;
        if payment_type == PaymentType::Purchase {
            let prior = self
                .db
                .find_transaction(payer.user_id, bot.id, PaymentType::Purchase, TransactionStatus::Success)
                .await?;
            guard_duplicate_purchase(payer.user_id, &bot, prior.as_ref())?;
        }
        let profile = self.payout_profile_for(bot.owner_id).await?;
        let split = RevenueSplit::new(paid, compute_split(profile.as_ref(), payment_type));
        Ok(NewTransaction {
            user_id: payer.user_id,
            admin_id: bot.owner_id,
            bot_id: bot.id,
            amount: paid,
            split,
            reference: reference.to_string(),
            payment_channel: PAYMENT_CHANNEL.to_string(),
            payment_type,
            description,
        })
    }

    /// Steps that must happen together or not at all. Any early return drops the unit, which rolls it back.
    async fn apply_unit(
        &self,
        reference: &str,
        paid: MinorUnits,
        synthesized: Option<NewTransaction>,
    ) -> Result<ReconcileOutcome, ReconciliationError> {
        let mut unit = self.db.begin_unit().await?;
        if let Some(new_tx) = synthesized {
            if let InsertTransactionResult::AlreadyExists(tx) = unit.insert_transaction(new_tx).await? {
                debug!("💳️ [{reference}] was recorded concurrently with id {}", tx.id);
            }
        }
        let tx = unit
            .lock_transaction(reference)
            .await?
            .ok_or_else(|| ReconciliationError::NotFound(format!("Transaction {reference}")))?;
        match tx.status {
            TransactionStatus::Pending => {},
            TransactionStatus::Success => {
                debug!("💳️ [{reference}] was reconciled by a concurrent event");
                return Ok(ReconcileOutcome::AlreadyReconciled { transaction: tx });
            },
            TransactionStatus::Failed => return Err(ReconciliationError::TransactionClosed(tx.reference)),
        }

        let bot = unit
            .fetch_bot(tx.bot_id)
            .await?
            .ok_or_else(|| ReconciliationError::NotFound(format!("Bot #{}", tx.bot_id)))?;
        validate_amount(paid, expected_price(&bot, tx.payment_type)).map_err(|e| {
            warn!("💳️ [{reference}] paid {paid} for bot #{}, which is not enough. The transaction stays pending.", bot.id);
            e
        })?;
        if tx.payment_type == PaymentType::Purchase {
            let other = unit.fetch_other_successful_purchase(tx.user_id, bot.id, reference).await?;
            guard_duplicate_purchase(tx.user_id, &bot, other.as_ref())?;
            if bot.owner_id != tx.admin_id {
                warn!(
                    "💳️ [{reference}] was opened to pay user #{} but bot #{} now belongs to user #{}. The transaction \
                     stays pending.",
                    tx.admin_id, bot.id, bot.owner_id
                );
                return Err(ReconciliationError::PayeeChanged { reference: tx.reference, bot_id: bot.id });
            }
        }

        let split = RevenueSplit::new(paid, tx.split_percent());
        let tx = unit.mark_transaction_success(reference, paid, split).await?;
        if tx.payment_type == PaymentType::Purchase {
            let seller_id = tx.admin_id;
            unit.transfer_ownership(bot.id, tx.user_id).await?;
            let sale = NewSale {
                bot_id: bot.id,
                seller_id,
                buyer_id: tx.user_id,
                amount: paid,
                sale_type: PaymentType::Purchase,
                transaction_ref: tx.reference.clone(),
            };
            unit.insert_sale(sale).await?;
            let revoked = unit.revoke_purchase_grants(bot.id, tx.user_id).await?;
            debug!("💳️ Bot #{} moves from user #{seller_id} to user #{}. {revoked} grant(s) revoked", bot.id, tx.user_id);
        }
        let grant = unit.insert_grant_if_absent(entitlement_for(&tx, Utc::now())).await?;
        unit.commit().await?;
        info!(
            "💳️ [{reference}] reconciled: {} of bot #{} by user #{} for {paid} (company {}, admin {})",
            tx.payment_type, tx.bot_id, tx.user_id, tx.company_share, tx.admin_share
        );
        Ok(ReconcileOutcome::Reconciled { transaction: tx, grant })
    }

    /// Fetches the admin's payout profile, registering a gateway subaccount first if the bank details are complete
    /// and none exists yet. A failed registration is logged and the profile is used as it is.
    async fn payout_profile_for(&self, admin_id: i64) -> Result<Option<PayoutProfile>, ReconciliationError> {
        match self.db.fetch_payout_profile(admin_id).await? {
            Some(profile) if profile.needs_subaccount() => {},
            other => return Ok(other),
        }
        let _guard = self.subaccount_lock.lock().await;
        let profile = match self.db.fetch_payout_profile(admin_id).await? {
            Some(profile) if profile.needs_subaccount() => profile,
            other => return Ok(other),
        };
        match self.gateway_call(self.gateway.create_payout_subaccount(&profile)).await {
            Ok(code) => {
                let profile = self.db.save_subaccount_code(admin_id, &code).await?;
                info!("💳️ Payout subaccount {code} registered for admin #{admin_id}");
                Ok(Some(profile))
            },
            Err(e) => {
                warn!("💳️ Could not register a payout subaccount for admin #{admin_id}. {e}");
                Ok(Some(profile))
            },
        }
    }

    async fn fetch_transaction(&self, reference: &str) -> Result<Transaction, ReconciliationError> {
        self.db
            .fetch_transaction_by_reference(reference)
            .await?
            .ok_or_else(|| ReconciliationError::NotFound(format!("Transaction {reference}")))
    }

    async fn gateway_call<T, F>(&self, call: F) -> Result<T, ReconciliationError>
    where F: Future<Output = Result<T, GatewayError>> {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result.map_err(ReconciliationError::from),
            Err(_) => Err(ReconciliationError::GatewayUnreachable(format!(
                "No answer from the payment gateway within {}s",
                self.gateway_timeout.as_secs_f32()
            ))),
        }
    }
}

/// The payer, or a superadmin.
fn check_payer(principal: &Principal, tx: &Transaction) -> Result<(), ReconciliationError> {
    if principal.is_super_admin() {
        return Ok(());
    }
    check_owner(principal, tx)
}

fn check_owner(principal: &Principal, tx: &Transaction) -> Result<(), ReconciliationError> {
    if tx.user_id != principal.user_id {
        return Err(ReconciliationError::Forbidden(format!(
            "Transaction {} does not belong to user #{}",
            tx.reference, principal.user_id
        )));
    }
    Ok(())
}
