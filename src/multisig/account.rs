//! Account key flows built on the coordinator
//!
//! Changing an account's key needs signatures from both the key being
//! replaced and the key replacing it. Each side is either a private key held
//! locally (signed directly) or a threshold key (signatures collected through
//! the coordinator). Whether the result satisfies both policies is left to
//! the ledger.

use crate::core::{
    AccountId, Clock, Hbar, Key, Operator, ThresholdKey, Transaction, TransactionBuilder,
};
use crate::crypto::KeyPair;
use crate::multisig::coordinator::{Coordinator, SigningRound};
use crate::multisig::source::SignatureSource;
use crate::multisig::MultisigError;
use log::info;
use std::io::Write;

/// How one side of a key change signs
#[derive(Clone, Debug)]
pub enum KeyAuthority {
    /// A private key available locally
    Signer(KeyPair),
    /// Signatures are gathered from external key holders. The empty
    /// threshold key means "nothing to collect for this side".
    Threshold(ThresholdKey),
}

impl KeyAuthority {
    /// The key policy this authority represents
    pub fn key(&self) -> Key {
        match self {
            KeyAuthority::Signer(key_pair) => Key::Single(key_pair.public_key()),
            KeyAuthority::Threshold(threshold_key) => Key::Threshold(threshold_key.clone()),
        }
    }

    /// Add this side's signatures to `transaction`
    fn sign<S, C, W>(
        &self,
        transaction: Transaction,
        coordinator: &mut Coordinator<S, C, W>,
        side: &str,
    ) -> Result<Transaction, MultisigError>
    where
        S: SignatureSource,
        C: Clock,
        W: Write,
    {
        match self {
            KeyAuthority::Signer(key_pair) => {
                let mut transaction = transaction;
                transaction.sign(key_pair)?;
                info!("{} key {} signed directly", side, key_pair.public_key());
                Ok(transaction)
            }
            KeyAuthority::Threshold(threshold_key) if threshold_key.is_empty() => {
                info!("no {} key signatures to collect", side);
                Ok(transaction)
            }
            KeyAuthority::Threshold(threshold_key) => {
                info!(
                    "collecting {} key signatures ({})",
                    side,
                    threshold_key.description()
                );
                let expected = coordinator.expected_for(threshold_key.threshold() as usize)?;
                let SigningRound { transaction, .. } =
                    coordinator.collect_signatures(transaction, expected)?;
                Ok(transaction)
            }
        }
    }
}

/// Build and sign a key change for `account`
///
/// Signs with the payer, then gathers the old key's signatures, then the
/// new key's. The returned transaction is ready to submit; nothing checks
/// locally that both policies are satisfied.
pub fn update_account_keys<S, C, W>(
    coordinator: &mut Coordinator<S, C, W>,
    account: AccountId,
    old_key: &KeyAuthority,
    new_key: &KeyAuthority,
    payer: &Operator,
) -> Result<Transaction, MultisigError>
where
    S: SignatureSource,
    C: Clock,
    W: Write,
{
    let mut transaction = TransactionBuilder::account_update(account, new_key.key())
        .generate_transaction_id(payer.account_id)
        .freeze()?;
    transaction.sign(&payer.key)?;

    let transaction = old_key.sign(transaction, coordinator, "old")?;
    new_key.sign(transaction, coordinator, "new")
}

/// Build a payer-signed transaction creating an account under `key`
pub fn create_multisig_account(
    key: ThresholdKey,
    initial_balance: Hbar,
    payer: &Operator,
) -> Result<Transaction, MultisigError> {
    let mut transaction = TransactionBuilder::account_create(Key::Threshold(key), initial_balance)
        .generate_transaction_id(payer.account_id)
        .freeze()?;
    transaction.sign(&payer.key)?;
    Ok(transaction)
}

/// Build a transfer out of `from` and collect the signatures its key needs
pub fn transfer_from_account<S, C, W>(
    coordinator: &mut Coordinator<S, C, W>,
    from: AccountId,
    from_key: &KeyAuthority,
    to: AccountId,
    amount: Hbar,
    payer: &Operator,
) -> Result<Transaction, MultisigError>
where
    S: SignatureSource,
    C: Clock,
    W: Write,
{
    let mut transaction = TransactionBuilder::hbar_transfer(from, to, amount)
        .generate_transaction_id(payer.account_id)
        .freeze()?;
    transaction.sign(&payer.key)?;
    from_key.sign(transaction, coordinator, "sender")
}

/// Work out how the key currently securing an account can sign
///
/// An explicit private key wins. Otherwise a threshold key is collected
/// externally, and a single key must be the operator's own.
pub fn resolve_old_authority(
    current: &Key,
    explicit: Option<KeyPair>,
    operator: &Operator,
) -> Result<KeyAuthority, MultisigError> {
    if let Some(key_pair) = explicit {
        return Ok(KeyAuthority::Signer(key_pair));
    }

    match current {
        Key::Threshold(threshold_key) => Ok(KeyAuthority::Threshold(threshold_key.clone())),
        Key::Single(public_key) if *public_key == operator.key.public_key() => {
            Ok(KeyAuthority::Signer(operator.key.clone()))
        }
        Key::Single(public_key) => Err(MultisigError::MissingPrivateKey(*public_key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{build_threshold_key, ManualClock, TransactionKind};
    use crate::ledger::{LedgerClient, LedgerError, LocalLedger, Status};
    use crate::multisig::{
        decode_transaction, sign_contributions, ExpectedCount, ScriptedSource,
        SignatureContribution,
    };
    use chrono::{Duration, Utc};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    /// Operator display shared with the simulated key holders
    #[derive(Clone, Default)]
    struct Screen(Rc<RefCell<Vec<u8>>>);

    impl Write for Screen {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Screen {
        /// The blob most recently shown between the copy markers
        fn last_blob(&self) -> String {
            let text = String::from_utf8_lossy(&self.0.borrow()).to_string();
            let parts: Vec<&str> = text.split("-------Copy between lines-------").collect();
            parts[parts.len().saturating_sub(2)].trim().to_string()
        }
    }

    /// Key holders who read the blob off the screen and answer in turn.
    /// `None` stands for a holder who pastes nothing.
    struct KeyHolders {
        screen: Screen,
        queue: VecDeque<Option<KeyPair>>,
    }

    impl SignatureSource for KeyHolders {
        fn next_line(&mut self, _index: usize) -> io::Result<String> {
            let Some(Some(holder)) = self.queue.pop_front() else {
                return Ok(String::new());
            };
            let to_io = |e: String| io::Error::new(io::ErrorKind::InvalidData, e);
            let tx = decode_transaction(&self.screen.last_blob()).map_err(|e| to_io(e.to_string()))?;
            let contributions =
                sign_contributions(&tx, std::slice::from_ref(&holder)).map_err(|e| to_io(e.to_string()))?;
            Ok(contributions[0].to_string())
        }
    }

    fn holders_coordinator(
        queue: Vec<Option<KeyPair>>,
    ) -> Coordinator<KeyHolders, ManualClock, Screen> {
        let screen = Screen::default();
        let source = KeyHolders {
            screen: screen.clone(),
            queue: queue.into(),
        };
        Coordinator::new(
            source,
            ManualClock::stepping(Utc::now(), Duration::seconds(1)),
            screen,
        )
    }

    fn scripted_coordinator(lines: Vec<String>) -> Coordinator<ScriptedSource, ManualClock, Vec<u8>> {
        Coordinator::new(
            ScriptedSource::new(lines),
            ManualClock::stepping(Utc::now(), Duration::seconds(1)),
            Vec::new(),
        )
    }

    struct Fixture {
        ledger: LocalLedger,
        operator: Operator,
    }

    fn fixture() -> Fixture {
        let operator = Operator::new(AccountId::from_num(2), KeyPair::generate());
        let ledger = LocalLedger::genesis(
            operator.account_id,
            Key::Single(operator.key.public_key()),
            Hbar::new(1_000),
            Box::new(ManualClock::new(Utc::now())),
        );
        Fixture { ledger, operator }
    }

    fn holders(n: usize) -> Vec<KeyPair> {
        (0..n).map(|_| KeyPair::generate()).collect()
    }

    fn threshold(keys: &[KeyPair], m: u32) -> ThresholdKey {
        build_threshold_key(keys.iter().map(|k| k.public_key()).collect(), m).unwrap()
    }

    fn create_account(f: &mut Fixture, key: Key) -> AccountId {
        let mut tx = TransactionBuilder::account_create(key, Hbar::new(10))
            .generate_transaction_id(f.operator.account_id)
            .freeze()
            .unwrap();
        tx.sign(&f.operator.key).unwrap();
        f.ledger.submit(&tx).unwrap().account_id.unwrap()
    }

    #[test]
    fn test_declared_count_overrides_threshold() {
        let mut f = fixture();
        let keys = holders(3);
        let tk = threshold(&keys, 2);
        let account = create_account(&mut f, Key::Threshold(tk.clone()));

        // Three holders answer for a 2-of-3 key
        let mut coordinator = holders_coordinator(keys.iter().cloned().map(Some).collect())
            .with_expected(ExpectedCount::Fixed(3));
        let tx = transfer_from_account(
            &mut coordinator,
            account,
            &KeyAuthority::Threshold(tk),
            f.operator.account_id,
            Hbar::new(1),
            &f.operator,
        )
        .unwrap();

        assert!(coordinator.source().queue.is_empty());
        assert_eq!(tx.signature_count(), 4);
        f.ledger.submit(&tx).unwrap();
        assert_eq!(f.ledger.account_info(&account).unwrap().balance, Hbar::new(9));
    }

    #[test]
    fn test_create_multisig_account() {
        let mut f = fixture();
        let tk = threshold(&holders(3), 2);

        let tx = create_multisig_account(tk.clone(), Hbar::new(10), &f.operator).unwrap();
        assert_eq!(tx.signature_count(), 1);
        let account = f.ledger.submit(&tx).unwrap().account_id.unwrap();

        let info = f.ledger.account_info(&account).unwrap();
        assert_eq!(info.key, Key::Threshold(tk));
        assert_eq!(info.balance, Hbar::new(10));
    }

    #[test]
    fn test_convert_single_key_account_to_multisig() {
        let mut f = fixture();
        let old = KeyPair::generate();
        let account = create_account(&mut f, Key::Single(old.public_key()));

        let keys = holders(3);
        let tk = threshold(&keys, 2);
        let mut coordinator =
            holders_coordinator(vec![Some(keys[0].clone()), Some(keys[2].clone())]);

        let tx = update_account_keys(
            &mut coordinator,
            account,
            &KeyAuthority::Signer(old),
            &KeyAuthority::Threshold(tk.clone()),
            &f.operator,
        )
        .unwrap();
        assert_eq!(tx.signature_count(), 4);

        let receipt = f.ledger.submit(&tx).unwrap();
        assert_eq!(receipt.status, Status::Success);
        assert_eq!(f.ledger.account_info(&account).unwrap().key, Key::Threshold(tk));
    }

    #[test]
    fn test_update_multisig_to_new_multisig() {
        let mut f = fixture();
        let old_keys = holders(3);
        let old_tk = threshold(&old_keys, 2);
        let account = create_account(&mut f, Key::Threshold(old_tk.clone()));

        let new_keys = holders(2);
        let new_tk = threshold(&new_keys, 2);
        let mut coordinator = holders_coordinator(vec![
            Some(old_keys[1].clone()),
            Some(old_keys[2].clone()),
            Some(new_keys[0].clone()),
            Some(new_keys[1].clone()),
        ]);

        let tx = update_account_keys(
            &mut coordinator,
            account,
            &KeyAuthority::Threshold(old_tk),
            &KeyAuthority::Threshold(new_tk.clone()),
            &f.operator,
        )
        .unwrap();

        f.ledger.submit(&tx).unwrap();
        assert_eq!(f.ledger.account_info(&account).unwrap().key, Key::Threshold(new_tk));
    }

    #[test]
    fn test_revert_multisig_to_single_key() {
        let mut f = fixture();
        let old_keys = holders(3);
        let old_tk = threshold(&old_keys, 2);
        let account = create_account(&mut f, Key::Threshold(old_tk.clone()));

        let mut coordinator =
            holders_coordinator(vec![Some(old_keys[0].clone()), Some(old_keys[1].clone())]);
        let tx = update_account_keys(
            &mut coordinator,
            account,
            &KeyAuthority::Threshold(old_tk),
            &KeyAuthority::Signer(f.operator.key.clone()),
            &f.operator,
        )
        .unwrap();

        f.ledger.submit(&tx).unwrap();
        assert_eq!(
            f.ledger.account_info(&account).unwrap().key,
            Key::Single(f.operator.key.public_key())
        );
    }

    #[test]
    fn test_update_signs_payer_old_and_new() {
        let f = fixture();
        let old = KeyPair::generate();
        let new = KeyPair::generate();

        let mut coordinator = scripted_coordinator(Vec::new());
        let tx = update_account_keys(
            &mut coordinator,
            AccountId::from_num(1001),
            &KeyAuthority::Signer(old.clone()),
            &KeyAuthority::Signer(new.clone()),
            &f.operator,
        )
        .unwrap();

        let signers = tx.signers();
        assert_eq!(signers.len(), 3);
        assert!(signers.contains(&f.operator.key.public_key()));
        assert!(signers.contains(&old.public_key()));
        assert!(signers.contains(&new.public_key()));
        assert!(tx.invalid_signers().unwrap().is_empty());
        match tx.kind() {
            TransactionKind::AccountUpdate { key, .. } => {
                assert_eq!(key, &Key::Single(new.public_key()))
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_empty_old_key_skips_collection() {
        let f = fixture();

        // No scripted lines: consulting the source would fail the flow
        let mut coordinator = scripted_coordinator(Vec::new());
        let tx = update_account_keys(
            &mut coordinator,
            AccountId::from_num(1001),
            &KeyAuthority::Threshold(ThresholdKey::empty()),
            &KeyAuthority::Signer(KeyPair::generate()),
            &f.operator,
        )
        .unwrap();

        assert_eq!(tx.signature_count(), 2);
    }

    #[test]
    fn test_threshold_side_attaches_without_checks() {
        let f = fixture();
        let keys = holders(3);
        let tk = threshold(&keys, 2);

        let lines = vec![
            SignatureContribution::new(keys[0].public_key(), vec![1; 64]).to_string(),
            String::new(),
        ];
        let mut coordinator = scripted_coordinator(lines);
        let tx = update_account_keys(
            &mut coordinator,
            AccountId::from_num(1001),
            &KeyAuthority::Threshold(tk),
            &KeyAuthority::Signer(f.operator.key.clone()),
            &f.operator,
        )
        .unwrap();

        // Threshold of 2 lines read, one blank; the bogus signature is kept
        assert_eq!(coordinator.source().remaining(), 0);
        assert_eq!(tx.signature_count(), 2);
        assert!(tx.signature(&keys[0].public_key()).is_some());
    }

    #[test]
    fn test_insufficient_old_signatures_rejected_by_ledger() {
        let mut f = fixture();
        let old_keys = holders(3);
        let old_tk = threshold(&old_keys, 2);
        let account = create_account(&mut f, Key::Threshold(old_tk.clone()));

        // Only one of the two required holders answers
        let mut coordinator = holders_coordinator(vec![Some(old_keys[0].clone()), None]);
        let tx = update_account_keys(
            &mut coordinator,
            account,
            &KeyAuthority::Threshold(old_tk.clone()),
            &KeyAuthority::Signer(f.operator.key.clone()),
            &f.operator,
        )
        .unwrap();

        assert!(matches!(
            f.ledger.submit(&tx),
            Err(LedgerError::Rejected(Status::InvalidSignature))
        ));
        assert_eq!(f.ledger.account_info(&account).unwrap().key, Key::Threshold(old_tk));
    }

    #[test]
    fn test_transfer_from_multisig_account() {
        let mut f = fixture();
        let keys = holders(3);
        let tk = threshold(&keys, 2);
        let account = create_account(&mut f, Key::Threshold(tk.clone()));

        let mut coordinator =
            holders_coordinator(vec![Some(keys[1].clone()), Some(keys[2].clone())]);
        let tx = transfer_from_account(
            &mut coordinator,
            account,
            &KeyAuthority::Threshold(tk),
            f.operator.account_id,
            Hbar::new(4),
            &f.operator,
        )
        .unwrap();
        f.ledger.submit(&tx).unwrap();

        assert_eq!(f.ledger.account_info(&account).unwrap().balance, Hbar::new(6));
    }

    #[test]
    fn test_resolve_old_authority() {
        let f = fixture();
        let keys = holders(2);
        let tk = threshold(&keys, 1);

        let resolved =
            resolve_old_authority(&Key::Threshold(tk.clone()), None, &f.operator).unwrap();
        assert!(matches!(resolved, KeyAuthority::Threshold(k) if k == tk));

        let own = Key::Single(f.operator.key.public_key());
        let resolved = resolve_old_authority(&own, None, &f.operator).unwrap();
        assert!(matches!(resolved, KeyAuthority::Signer(_)));

        let foreign = Key::Single(keys[0].public_key());
        assert!(matches!(
            resolve_old_authority(&foreign, None, &f.operator),
            Err(MultisigError::MissingPrivateKey(_))
        ));

        let explicit = resolve_old_authority(&foreign, Some(keys[0].clone()), &f.operator).unwrap();
        assert_eq!(explicit.key(), foreign);
    }
}
