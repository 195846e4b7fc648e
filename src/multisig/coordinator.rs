//! Offline signature collection
//!
//! The coordinator shows the encoded transaction to the operator, reads
//! back exactly `expected_count` contribution lines, and attaches each
//! decoded signature. It never checks signatures or thresholds: an
//! incomplete or invalid signature set is only discovered when the network
//! rejects the submission.

use crate::core::{Clock, Transaction};
use crate::multisig::contribution::SignatureContribution;
use crate::multisig::source::SignatureSource;
use crate::multisig::MultisigError;
use chrono::Duration;
use log::{debug, info, warn};
use std::io::Write;

/// Collection time at which the transaction is likely to have expired
pub const EXPIRY_WARNING_SECS: i64 = 119;

/// Frames text meant to be copied between terminals
pub const COPY_MARKER: &str = "-------Copy between lines-------";

/// What to do with a line that cannot be decoded
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MalformedLinePolicy {
    /// Fail the whole collection
    #[default]
    Abort,
    /// Log a warning and move on
    Skip,
}

/// How many contribution lines a round waits for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpectedCount {
    /// One line per required signature
    #[default]
    Threshold,
    /// A count chosen up front
    Fixed(usize),
    /// Ask the signature source, offering the threshold
    Ask,
}

/// Progress of a single collection round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionPhase {
    Built,
    Displayed,
    Collecting { received: usize, expected: usize },
    Finalized,
}

/// Outcome of a collection round
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionReport {
    /// Contributions attached (a repeated key counts each time)
    pub added: usize,
    /// Blank lines
    pub skipped: usize,
    /// Undecodable lines ignored under [`MalformedLinePolicy::Skip`]
    pub malformed: usize,
    pub elapsed: Duration,
    pub likely_expired: bool,
}

/// The transaction with its new signatures, plus how the round went
#[derive(Clone, Debug)]
pub struct SigningRound {
    pub transaction: Transaction,
    pub report: CollectionReport,
}

/// Drives one signature collection round at a time
pub struct Coordinator<S, C, W> {
    source: S,
    clock: C,
    display: W,
    policy: MalformedLinePolicy,
    expected: ExpectedCount,
    phase: CollectionPhase,
}

impl<S: SignatureSource, C: Clock, W: Write> Coordinator<S, C, W> {
    pub fn new(source: S, clock: C, display: W) -> Self {
        Self {
            source,
            clock,
            display,
            policy: MalformedLinePolicy::default(),
            expected: ExpectedCount::default(),
            phase: CollectionPhase::Built,
        }
    }

    pub fn with_policy(mut self, policy: MalformedLinePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MalformedLinePolicy {
        self.policy
    }

    pub fn with_expected(mut self, expected: ExpectedCount) -> Self {
        self.expected = expected;
        self
    }

    /// Line count for a round against a key requiring `threshold` signatures
    pub fn expected_for(&mut self, threshold: usize) -> Result<usize, MultisigError> {
        let count = match self.expected {
            ExpectedCount::Threshold => threshold,
            ExpectedCount::Fixed(count) => count,
            ExpectedCount::Ask => self.source.expected_count(threshold)?,
        };
        if count != threshold {
            info!("expecting {} signature line(s), threshold is {}", count, threshold);
        }
        Ok(count)
    }

    /// Phase of the current (or last) round
    pub fn phase(&self) -> CollectionPhase {
        self.phase
    }

    pub fn display(&self) -> &W {
        &self.display
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn enter(&mut self, phase: CollectionPhase) {
        debug!("collection phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Collect `expected_count` contributions for `transaction`
    ///
    /// Blank lines are skipped. An undecodable line aborts the round under
    /// [`MalformedLinePolicy::Abort`] and is counted as malformed under
    /// [`MalformedLinePolicy::Skip`]. Taking 119 seconds or more produces a
    /// warning, never an error.
    pub fn collect_signatures(
        &mut self,
        mut transaction: Transaction,
        expected_count: usize,
    ) -> Result<SigningRound, MultisigError> {
        self.enter(CollectionPhase::Built);
        let blob = transaction.to_base64()?;
        let digest = transaction.body_digest()?;
        debug!("{} body digest {}", transaction.transaction_id(), digest);

        writeln!(self.display, "\n-MultiSig signing\n")?;
        writeln!(
            self.display,
            "Please collect the additional signatures:\n\n\
             return format <public key1>:<signed bytes1>\n\n\
             {COPY_MARKER}\n{blob}\n{COPY_MARKER}\n\n\
             body digest: {digest}"
        )?;
        writeln!(
            self.display,
            "\n\nExpecting {expected_count}\n\nPlease paste each separately: "
        )?;
        self.display.flush()?;

        let started = self.clock.now();
        self.enter(CollectionPhase::Displayed);

        let mut lines = Vec::with_capacity(expected_count);
        for index in 0..expected_count {
            self.enter(CollectionPhase::Collecting {
                received: index,
                expected: expected_count,
            });
            lines.push(self.source.next_line(index)?);
        }

        let mut report = CollectionReport {
            added: 0,
            skipped: 0,
            malformed: 0,
            elapsed: Duration::zero(),
            likely_expired: false,
        };

        for (index, line) in lines.iter().enumerate() {
            match SignatureContribution::parse_line(line) {
                Ok(Some(contribution)) => {
                    info!(
                        "attaching signature #{} from {}",
                        index, contribution.public_key
                    );
                    transaction.add_signature(contribution.public_key, contribution.signature);
                    report.added += 1;
                }
                Ok(None) => {
                    debug!("signature line #{} empty, skipped", index);
                    report.skipped += 1;
                }
                Err(source) => match self.policy {
                    MalformedLinePolicy::Abort => {
                        return Err(MultisigError::Contribution { index, source });
                    }
                    MalformedLinePolicy::Skip => {
                        warn!("ignoring malformed signature line #{}: {}", index, source);
                        report.malformed += 1;
                    }
                },
            }
        }

        writeln!(self.display, "\n\n-Added {} signatures", report.added)?;

        report.elapsed = self.clock.now() - started;
        if report.elapsed.num_milliseconds() >= EXPIRY_WARNING_SECS * 1000 {
            warn!(
                "signature collection took {}s, transaction {} has likely expired",
                report.elapsed.num_seconds(),
                transaction.transaction_id()
            );
            writeln!(self.display, "Likely time elapsed -- expect tx to fail")?;
            report.likely_expired = true;
        }
        self.display.flush()?;

        self.enter(CollectionPhase::Finalized);
        Ok(SigningRound {
            transaction,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        build_threshold_key, AccountId, Key, ManualClock, ThresholdKey, TransactionBuilder,
    };
    use crate::crypto::KeyPair;
    use crate::ledger::{AccountInfo, LedgerClient, LedgerError, Receipt, Status};
    use crate::multisig::{ContributionError, ScriptedSource};
    use chrono::Utc;

    type TestCoordinator = Coordinator<ScriptedSource, ManualClock, Vec<u8>>;

    /// Accepts a submission when enough designated keys signed
    struct ThresholdSubmitter {
        key: ThresholdKey,
    }

    impl LedgerClient for ThresholdSubmitter {
        fn submit(&mut self, tx: &Transaction) -> Result<Receipt, LedgerError> {
            if self.key.is_satisfied_by(&tx.signers()) && tx.invalid_signers()?.is_empty() {
                Ok(Receipt::success(*tx.transaction_id()))
            } else {
                Err(LedgerError::Rejected(Status::InvalidSignature))
            }
        }

        fn account_info(&self, account_id: &AccountId) -> Result<AccountInfo, LedgerError> {
            Err(LedgerError::AccountNotFound(*account_id))
        }
    }

    fn coordinator(lines: Vec<String>, step_secs: i64) -> TestCoordinator {
        let clock = ManualClock::stepping(Utc::now(), Duration::seconds(step_secs));
        Coordinator::new(ScriptedSource::new(lines), clock, Vec::new())
    }

    fn signers(n: usize) -> Vec<KeyPair> {
        (0..n).map(|_| KeyPair::generate()).collect()
    }

    fn update_tx(key: &ThresholdKey) -> Transaction {
        TransactionBuilder::account_update(AccountId::from_num(1001), Key::from(key.clone()))
            .generate_transaction_id(AccountId::from_num(2))
            .freeze()
            .unwrap()
    }

    fn line(kp: &KeyPair, tx: &Transaction) -> String {
        let sig = kp.sign(&tx.body_bytes().unwrap()).unwrap();
        SignatureContribution::new(kp.public_key(), sig).to_string()
    }

    #[test]
    fn test_two_of_three_end_to_end() {
        let keys = signers(3);
        let tk = build_threshold_key(keys.iter().map(|k| k.public_key()).collect(), 2).unwrap();
        let tx = update_tx(&tk);

        let lines = vec![line(&keys[0], &tx), line(&keys[1], &tx)];
        let mut coordinator = coordinator(lines, 1);
        let round = coordinator.collect_signatures(tx, 2).unwrap();

        assert_eq!(round.report.added, 2);
        assert_eq!(round.transaction.signature_count(), 2);
        assert!(round.transaction.signature(&keys[0].public_key()).is_some());
        assert!(round.transaction.signature(&keys[1].public_key()).is_some());
        assert!(round.transaction.signature(&keys[2].public_key()).is_none());
        assert_eq!(coordinator.phase(), CollectionPhase::Finalized);

        let mut submitter = ThresholdSubmitter { key: tk };
        let receipt = submitter.submit(&round.transaction).unwrap();
        assert_eq!(receipt.status, Status::Success);
    }

    #[test]
    fn test_too_few_signatures_fail_late() {
        let keys = signers(3);
        let tk = build_threshold_key(keys.iter().map(|k| k.public_key()).collect(), 2).unwrap();
        let tx = update_tx(&tk);

        let mut coordinator = coordinator(vec![line(&keys[0], &tx)], 1);
        let round = coordinator.collect_signatures(tx, 1).unwrap();
        assert_eq!(round.transaction.signature_count(), 1);

        let mut submitter = ThresholdSubmitter { key: tk };
        let result = submitter.submit(&round.transaction);
        assert!(matches!(
            result,
            Err(LedgerError::Rejected(Status::InvalidSignature))
        ));
    }

    #[test]
    fn test_display_carries_encoded_transaction() {
        let tk = build_threshold_key(vec![KeyPair::generate().public_key()], 1).unwrap();
        let tx = update_tx(&tk);
        let blob = tx.to_base64().unwrap();
        let digest = crate::multisig::describe(&tx).body_digest.unwrap();

        let mut coordinator = coordinator(Vec::new(), 1);
        coordinator.collect_signatures(tx, 0).unwrap();

        let shown = String::from_utf8(coordinator.display().clone()).unwrap();
        assert!(shown.contains(&format!("{COPY_MARKER}\n{blob}\n{COPY_MARKER}")));
        assert!(shown.contains(&format!("body digest: {digest}")));
        assert!(shown.contains("<public key1>:<signed bytes1>"));
        assert!(shown.contains("-Added 0 signatures"));
    }

    #[test]
    fn test_expiry_warning_boundary() {
        let tk = build_threshold_key(vec![KeyPair::generate().public_key()], 1).unwrap();

        for (step, expect_warning) in [(118, false), (119, true), (120, true)] {
            let mut coordinator = coordinator(Vec::new(), step);
            let round = coordinator.collect_signatures(update_tx(&tk), 0).unwrap();

            assert_eq!(round.report.likely_expired, expect_warning, "step {step}");
            assert_eq!(round.report.elapsed, Duration::seconds(step));
            let shown = String::from_utf8(coordinator.display().clone()).unwrap();
            assert_eq!(shown.contains("Likely time elapsed"), expect_warning);
        }
    }

    #[test]
    fn test_just_under_threshold_does_not_warn() {
        let tk = build_threshold_key(vec![KeyPair::generate().public_key()], 1).unwrap();
        let clock = ManualClock::stepping(Utc::now(), Duration::milliseconds(118_999));
        let mut coordinator = Coordinator::new(ScriptedSource::default(), clock, Vec::new());

        let round = coordinator.collect_signatures(update_tx(&tk), 0).unwrap();
        assert!(!round.report.likely_expired);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let keys = signers(2);
        let tk = build_threshold_key(keys.iter().map(|k| k.public_key()).collect(), 2).unwrap();
        let tx = update_tx(&tk);

        let lines = vec![String::new(), line(&keys[1], &tx), "   ".to_string()];
        let mut coordinator = coordinator(lines, 1);
        let round = coordinator.collect_signatures(tx, 3).unwrap();

        assert_eq!(round.report.added, 1);
        assert_eq!(round.report.skipped, 2);
        assert_eq!(round.transaction.signature_count(), 1);
    }

    #[test]
    fn test_same_key_twice_keeps_last() {
        let kp = KeyPair::generate();
        let tk = build_threshold_key(vec![kp.public_key()], 1).unwrap();
        let tx = update_tx(&tk);

        let stale = SignatureContribution::new(kp.public_key(), vec![7; 64]).to_string();
        let fresh = line(&kp, &tx);
        let expected = SignatureContribution::parse_line(&fresh).unwrap().unwrap();

        let mut coordinator = coordinator(vec![stale, fresh], 1);
        let round = coordinator.collect_signatures(tx, 2).unwrap();

        assert_eq!(round.report.added, 2);
        assert_eq!(round.transaction.signature_count(), 1);
        assert_eq!(
            round.transaction.signature(&kp.public_key()),
            Some(expected.signature.as_slice())
        );
    }

    #[test]
    fn test_malformed_line_aborts() {
        let kp = KeyPair::generate();
        let tk = build_threshold_key(vec![kp.public_key()], 1).unwrap();
        let tx = update_tx(&tk);

        let lines = vec![line(&kp, &tx), "no separator here".to_string()];
        let mut coordinator = coordinator(lines, 1);
        let result = coordinator.collect_signatures(tx, 2);

        assert!(matches!(
            result,
            Err(MultisigError::Contribution {
                index: 1,
                source: ContributionError::MissingSeparator
            })
        ));
        assert_ne!(coordinator.phase(), CollectionPhase::Finalized);
    }

    #[test]
    fn test_malformed_line_skipped_under_skip_policy() {
        let kp = KeyPair::generate();
        let tk = build_threshold_key(vec![kp.public_key()], 1).unwrap();
        let tx = update_tx(&tk);

        let lines = vec![
            "garbage".to_string(),
            format!("{}:%%%", kp.public_key()),
            line(&kp, &tx),
        ];
        let mut coordinator = coordinator(lines, 1).with_policy(MalformedLinePolicy::Skip);
        let round = coordinator.collect_signatures(tx, 3).unwrap();

        assert_eq!(round.report.malformed, 2);
        assert_eq!(round.report.added, 1);
        assert_eq!(round.transaction.signature_count(), 1);
    }

    #[test]
    fn test_signatures_are_not_verified_here() {
        let kp = KeyPair::generate();
        let tk = build_threshold_key(vec![kp.public_key()], 1).unwrap();
        let tx = update_tx(&tk);

        let bogus = SignatureContribution::new(kp.public_key(), vec![0; 64]).to_string();
        let mut coordinator = coordinator(vec![bogus], 1);
        let round = coordinator.collect_signatures(tx, 1).unwrap();

        assert_eq!(round.transaction.signature_count(), 1);
        assert_eq!(round.transaction.invalid_signers().unwrap(), vec![kp.public_key()]);
    }

    #[test]
    fn test_source_exhausted() {
        let tk = build_threshold_key(vec![KeyPair::generate().public_key()], 1).unwrap();
        let mut coordinator = coordinator(Vec::new(), 1);
        let result = coordinator.collect_signatures(update_tx(&tk), 1);
        assert!(matches!(result, Err(MultisigError::Io(_))));
    }

    #[test]
    fn test_expected_count_strategies() {
        let mut by_threshold = coordinator(Vec::new(), 1);
        assert_eq!(by_threshold.expected_for(2).unwrap(), 2);

        let mut fixed = coordinator(Vec::new(), 1).with_expected(ExpectedCount::Fixed(3));
        assert_eq!(fixed.expected_for(2).unwrap(), 3);

        let source = crate::multisig::TerminalSource::new(std::io::Cursor::new("4\n"), Vec::new());
        let mut asking = Coordinator::new(source, ManualClock::new(Utc::now()), Vec::new())
            .with_expected(ExpectedCount::Ask);
        assert_eq!(asking.expected_for(2).unwrap(), 4);
        assert!(matches!(asking.expected_for(2), Err(MultisigError::Io(_))));
    }

    #[test]
    fn test_reads_exactly_expected_count() {
        let kp = KeyPair::generate();
        let tk = build_threshold_key(vec![kp.public_key()], 1).unwrap();
        let tx = update_tx(&tk);

        let lines = vec![line(&kp, &tx), "extra".to_string()];
        let mut coordinator = coordinator(lines, 1);
        coordinator.collect_signatures(tx, 1).unwrap();
        assert_eq!(coordinator.source().remaining(), 1);
    }
}
