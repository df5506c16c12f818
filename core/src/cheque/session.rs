use ethers::types::Address;
use log::debug;
use rand::RngCore;

use super::{cheque_hash, sign_cheque_hash, SessionId, SignedCheque, SESSION_ID_LENGTH};
use crate::crypto::SignerKey;
use crate::error::{CoreError, Result};

/// Signs cheques with an exclusively owned key
#[derive(Debug)]
pub struct ChequeSigner {
    key: SignerKey,
}

impl ChequeSigner {
    /// Take ownership of a signing key
    pub fn new(key: SignerKey) -> Self {
        Self { key }
    }

    /// Address cheques are signed by
    pub fn address(&self) -> Address {
        self.key.address()
    }

    /// Sign one cheque
    pub fn sign_cheque(
        &self,
        contract: &Address,
        session_id: &SessionId,
        tablespace: &str,
        table: &str,
        amount: u64,
        nonce: u64,
    ) -> Result<SignedCheque> {
        let signer = self.address();
        let hash = cheque_hash(contract, &signer, session_id, tablespace, table, amount, nonce);
        Ok(SignedCheque {
            contract: *contract,
            signer,
            session_id: *session_id,
            tablespace: tablespace.to_string(),
            table: table.to_string(),
            amount,
            nonce,
            signature: sign_cheque_hash(&self.key, &hash)?,
        })
    }

    /// Open a session on `contract`, with a random id unless one is given
    pub fn open_session(self, contract: Address, session_id: Option<SessionId>) -> ChequeSession {
        ChequeSession::new(self, contract, session_id)
    }
}

/// A signer bound to one contract and session id
#[derive(Debug)]
pub struct ChequeSession {
    signer: ChequeSigner,
    contract: Address,
    session_id: SessionId,
}

impl ChequeSession {
    /// Bind `signer` to `contract`; a random 16-byte id is drawn when none is given
    pub fn new(signer: ChequeSigner, contract: Address, session_id: Option<SessionId>) -> Self {
        let session_id = session_id.unwrap_or_else(|| {
            let mut id = [0u8; SESSION_ID_LENGTH];
            rand::thread_rng().fill_bytes(&mut id);
            id
        });
        Self {
            signer,
            contract,
            session_id,
        }
    }

    /// Payment channel contract
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Session id
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Address cheques are signed by
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// Hash of a cheque of this session
    pub fn cheque_hash(&self, tablespace: &str, table: &str, amount: u64, nonce: u64) -> [u8; 32] {
        cheque_hash(
            &self.contract,
            &self.signer.address(),
            &self.session_id,
            tablespace,
            table,
            amount,
            nonce,
        )
    }

    /// Sign a cheque of this session with explicit amount and nonce
    pub fn sign_cheque(
        &self,
        tablespace: &str,
        table: &str,
        amount: u64,
        nonce: u64,
    ) -> Result<SignedCheque> {
        self.signer
            .sign_cheque(&self.contract, &self.session_id, tablespace, table, amount, nonce)
    }

    /// Start tracking amount and nonce from the given state
    pub fn tracking(self, cumulative_amount: u64, latest_nonce: u64) -> TrackingSession {
        TrackingSession {
            session: self,
            cumulative_amount,
            latest_nonce,
        }
    }
}

/// A session issuing successive cheques, each carrying the running total
///
/// Not synchronized: concurrent writers on one session must serialize their
/// calls to [`TrackingSession::sign_cheque`].
#[derive(Debug)]
pub struct TrackingSession {
    session: ChequeSession,
    cumulative_amount: u64,
    latest_nonce: u64,
}

impl TrackingSession {
    /// Underlying session
    pub fn session(&self) -> &ChequeSession {
        &self.session
    }

    /// Sum of all amounts signed so far, including the starting amount
    pub fn cumulative_amount(&self) -> u64 {
        self.cumulative_amount
    }

    /// Nonce of the last issued cheque
    pub fn latest_nonce(&self) -> u64 {
        self.latest_nonce
    }

    /// Whether the session has never issued a cheque, counting cheques
    /// issued before it was resumed
    pub fn is_fresh(&self) -> bool {
        self.latest_nonce == 0
    }

    /// Hash of the next cheque for `amount`, without issuing it
    pub fn next_cheque_hash(&self, tablespace: &str, table: &str, amount: u64) -> Result<[u8; 32]> {
        let (cumulative, nonce) = self.advance(amount)?;
        Ok(self.session.cheque_hash(tablespace, table, cumulative, nonce))
    }

    /// Add `amount` to the running total, bump the nonce, and sign a cheque for
    /// the new total and nonce
    pub fn sign_cheque(
        &mut self,
        tablespace: &str,
        table: &str,
        amount: u64,
    ) -> Result<SignedCheque> {
        let (cumulative, nonce) = self.advance(amount)?;
        let cheque = self.session.sign_cheque(tablespace, table, cumulative, nonce)?;
        self.cumulative_amount = cumulative;
        self.latest_nonce = nonce;
        debug!(
            "Cheque #{} for {}.{}: +{} = {}",
            nonce, tablespace, table, amount, cumulative
        );
        Ok(cheque)
    }

    fn advance(&self, amount: u64) -> Result<(u64, u64)> {
        let cumulative = self
            .cumulative_amount
            .checked_add(amount)
            .ok_or_else(|| CoreError::InvalidValue("Cheque amount overflows".to_string()))?;
        let nonce = self
            .latest_nonce
            .checked_add(1)
            .ok_or_else(|| CoreError::InvalidValue("Cheque nonce overflows".to_string()))?;
        Ok((cumulative, nonce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cheque::tests::{test_signer, TEST_CONTRACT, TEST_KEY, TEST_SESSION};
    use crate::cheque::{parse_address, parse_session_id, verify_cheque};

    fn reference_session() -> TrackingSession {
        let key = SignerKey::from_hex(TEST_KEY).unwrap();
        ChequeSigner::new(key)
            .open_session(
                parse_address(TEST_CONTRACT).unwrap(),
                Some(parse_session_id(TEST_SESSION).unwrap()),
            )
            .tracking(0, 0)
    }

    #[test]
    fn test_reference_signatures() {
        let mut tracking = reference_session();

        let first = tracking.sign_cheque("someTablespaceName", "someTableName", 110).unwrap();
        assert_eq!((first.amount, first.nonce), (110, 1));
        assert_eq!(
            hex::encode(first.signature),
            "0fe79bd6071edbfeb1a7afb669d2092bd1e35902b488dd212d3f7c2e0550a2fb\
             183485b6d406906be1d358ce5f26936ca1c3b2df646a463f3c1c1f57e290d02d1c"
        );

        let second = tracking.sign_cheque("someTablespaceName", "someTableName", 110).unwrap();
        assert_eq!((second.amount, second.nonce), (220, 2));
        assert_eq!(
            hex::encode(second.signature),
            "bc977e70cc9f7d6b2d7d0513d21459e5c7436f21df42450751b12412f0b35f86\
             4099b530dbcf0986d9351695dcad42cf3cd59486faef5d42b03927ecfbea4aaa1c"
        );

        verify_cheque(&first, &test_signer()).unwrap();
        verify_cheque(&second, &test_signer()).unwrap();
    }

    #[test]
    fn test_signing_is_deterministic() {
        let a = reference_session().sign_cheque("ts", "t", 5).unwrap();
        let b = reference_session().sign_cheque("ts", "t", 5).unwrap();
        assert_eq!(a, b);

        let c = reference_session().sign_cheque("ts", "u", 5).unwrap();
        assert_ne!(a.signature, c.signature);
    }

    #[test]
    fn test_tracking_is_monotonic() {
        let mut tracking = reference_session();
        assert!(tracking.is_fresh());
        let amounts = [10u64, 110, 0, 7];
        let mut total = 0;
        for (i, amount) in amounts.iter().enumerate() {
            let expected_hash = tracking.next_cheque_hash("ts", "t", *amount).unwrap();
            let cheque = tracking.sign_cheque("ts", "t", *amount).unwrap();
            total += amount;
            assert_eq!(cheque.hash(), expected_hash);
            assert_eq!(tracking.latest_nonce(), i as u64 + 1);
            assert_eq!(tracking.cumulative_amount(), total);
            assert_eq!(cheque.amount, total);
        }
        assert!(!tracking.is_fresh());
    }

    #[test]
    fn test_resumed_session() {
        let key = SignerKey::from_hex(TEST_KEY).unwrap();
        let mut tracking = ChequeSigner::new(key)
            .open_session(parse_address(TEST_CONTRACT).unwrap(), None)
            .tracking(1000, 41);
        assert!(!tracking.is_fresh());
        let cheque = tracking.sign_cheque("ts", "t", 10).unwrap();
        assert_eq!((cheque.amount, cheque.nonce), (1010, 42));
    }

    #[test]
    fn test_random_session_ids() {
        let contract = parse_address(TEST_CONTRACT).unwrap();
        let a = ChequeSigner::new(SignerKey::random()).open_session(contract, None);
        let b = ChequeSigner::new(SignerKey::random()).open_session(contract, None);
        assert_ne!(a.session_id(), b.session_id());
    }

    #[test]
    fn test_overflow_leaves_state_untouched() {
        let key = SignerKey::from_hex(TEST_KEY).unwrap();
        let mut tracking = ChequeSigner::new(key)
            .open_session(parse_address(TEST_CONTRACT).unwrap(), None)
            .tracking(u64::MAX, 3);
        assert!(matches!(tracking.sign_cheque("ts", "t", 1), Err(CoreError::InvalidValue(_))));
        assert_eq!(tracking.latest_nonce(), 3);
        assert_eq!(tracking.cumulative_amount(), u64::MAX);
    }
}
