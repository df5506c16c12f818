use ethers::types::Address;
use log::info;

use super::{ChequeSigner, SessionId, SignedCheque, TrackingSession};
use crate::config::ChequeConfig;
use crate::crypto::SignerKey;
use crate::error::{CoreError, Result};
use crate::tag::Tag;

/// Attaches a paying cheque to every entry written through it
#[derive(Debug)]
pub struct WriteContext {
    tracking: TrackingSession,
    fees: ChequeConfig,
}

impl WriteContext {
    /// Wrap an existing tracking session
    pub fn new(tracking: TrackingSession, fees: ChequeConfig) -> Self {
        Self { tracking, fees }
    }

    /// Open a tracking session for `key` on `contract`, resuming from
    /// `amount`/`nonce`
    pub fn open(
        key: SignerKey,
        contract: Address,
        session_id: Option<SessionId>,
        amount: u64,
        nonce: u64,
        fees: ChequeConfig,
    ) -> Self {
        let tracking = ChequeSigner::new(key)
            .open_session(contract, session_id)
            .tracking(amount, nonce);
        info!(
            "Cheque session {} opened on {:?} at nonce {}",
            hex::encode(tracking.session().session_id()),
            contract,
            nonce
        );
        Self::new(tracking, fees)
    }

    /// The tracking session
    pub fn tracking(&self) -> &TrackingSession {
        &self.tracking
    }

    /// Fee of the next entry: the entry fee, plus the session fee while the
    /// session has never issued a cheque
    pub fn next_fee(&self) -> Result<u64> {
        if !self.tracking.is_fresh() {
            return Ok(self.fees.entry_fee);
        }
        self.fees
            .entry_fee
            .checked_add(self.fees.session_fee)
            .ok_or_else(|| CoreError::InvalidValue("Entry and session fees overflow".to_string()))
    }

    /// Sign a cheque for `entry`'s table and append it to the entry's
    /// `ChequeList`
    pub fn write_entry_cheque(&mut self, entry: &mut Tag) -> Result<SignedCheque> {
        let header = entry.required_child("EntryHeader")?;
        let tablespace = header.child_text("TablespaceName")?;
        let table = header.child_text("TableName")?;

        let fee = self.next_fee()?;
        let cheque = self.tracking.sign_cheque(&tablespace, &table, fee)?;
        let tag = cheque.to_tag(self.fees.version)?;

        match entry.child_mut("ChequeList") {
            Some(list) => {
                list.add_child(tag)?;
            }
            None => {
                entry.add_container("ChequeList")?.add_child(tag)?;
            }
        }
        Ok(cheque)
    }
}
