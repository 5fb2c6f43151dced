// tests/integration_tests.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use guincoin_core::adapters::MemoryStore;
use guincoin_core::{
    AccountOwner, AllotmentEngine, ClaimProcess, Coins, Commands, Directory, Employee,
    HistoryQuery, Ledger, LedgerError, TransactionStatus, TransactionType, TransferConfig,
    TransferEngine, TransferOutcome,
};

struct StaticDirectory {
    by_email: HashMap<String, Employee>,
    by_id: HashMap<Uuid, Employee>,
}

impl StaticDirectory {
    fn new(employees: Vec<Employee>) -> Self {
        let by_email = employees
            .iter()
            .map(|e| (e.email.clone(), e.clone()))
            .collect();
        let by_id = employees.iter().map(|e| (e.id, e.clone())).collect();
        Self { by_email, by_id }
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn employee_by_email(&self, email: &str) -> Result<Option<Employee>, LedgerError> {
        Ok(self.by_email.get(&email.trim().to_lowercase()).cloned())
    }

    async fn employee_by_id(&self, id: Uuid) -> Result<Option<Employee>, LedgerError> {
        Ok(self.by_id.get(&id).cloned())
    }
}

struct Harness {
    ledger: Ledger,
    allotments: AllotmentEngine,
    transfers: TransferEngine,
    claims: ClaimProcess,
    commands: Commands,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness_with_config(employees: Vec<Employee>, config: TransferConfig) -> Harness {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let directory: Arc<dyn Directory> = Arc::new(StaticDirectory::new(employees));
    let notifier = Arc::new(guincoin_core::NullNotifier);

    let ledger = Ledger::new(store);
    let allotments = AllotmentEngine::new(
        ledger.clone(),
        Arc::clone(&directory),
        notifier.clone() as Arc<dyn guincoin_core::Notifier>,
    );
    let transfers = TransferEngine::new(
        ledger.clone(),
        Arc::clone(&directory),
        notifier as Arc<dyn guincoin_core::Notifier>,
        config,
    );
    let claims = ClaimProcess::new(ledger.clone());
    let commands = Commands::new(
        directory,
        ledger.clone(),
        allotments.clone(),
        transfers.clone(),
    );

    Harness {
        ledger,
        allotments,
        transfers,
        claims,
        commands,
    }
}

fn harness(employees: Vec<Employee>) -> Harness {
    harness_with_config(employees, TransferConfig::default())
}

/// Provision the employee's account and credit an opening balance through the
/// normal posting path.
async fn fund(h: &Harness, employee: &Employee, amount: Coins) -> Uuid {
    let account = h
        .ledger
        .ensure_account(AccountOwner::Employee(employee.id))
        .await
        .unwrap();
    if amount.is_positive() {
        h.ledger
            .post_adjustment(account.id, amount, "opening balance")
            .await
            .unwrap();
    }
    account.id
}

#[tokio::test]
async fn balance_view_separates_posted_and_pending() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    let account = fund(&h, &alice, Coins::from_major(100)).await;

    h.ledger
        .create_pending_transaction(
            account,
            TransactionType::WellnessReward,
            Coins::from_major(25),
            "step challenge",
            None,
        )
        .await
        .unwrap();

    let with_pending = h.ledger.balance(account, true).await.unwrap();
    assert_eq!(with_pending.posted, Coins::from_major(100));
    assert_eq!(with_pending.pending, Coins::from_major(25));
    assert_eq!(with_pending.total, Coins::from_major(125));

    let posted_only = h.ledger.balance(account, false).await.unwrap();
    assert_eq!(posted_only.posted, Coins::from_major(100));
    assert_eq!(posted_only.pending, Coins::ZERO);
    assert_eq!(posted_only.total, Coins::from_major(100));
}

#[tokio::test]
async fn transfer_moves_coins_between_registered_employees() {
    let alice = Employee::new("alice@guin.co", false);
    let bob = Employee::new("bob@guin.co", false);
    let h = harness(vec![alice.clone(), bob.clone()]);
    let alice_account = fund(&h, &alice, Coins::from_major(100)).await;
    let bob_account = fund(&h, &bob, Coins::ZERO).await;

    let outcome = h
        .transfers
        .transfer(alice.id, "bob@guin.co", Coins::from_major(30), "great demo")
        .await
        .unwrap();

    assert!(!outcome.is_pending());
    assert_eq!(outcome.sender_balance().posted, Coins::from_major(70));

    let bob_balance = h.ledger.balance(bob_account, true).await.unwrap();
    assert_eq!(bob_balance.posted, Coins::from_major(30));

    let sent = h
        .ledger
        .history(alice_account, &HistoryQuery::default())
        .await
        .unwrap();
    assert!(sent.iter().any(|t| {
        t.tx_type == TransactionType::PeerTransferSent && t.status == TransactionStatus::Posted
    }));
    let received = h
        .ledger
        .history(bob_account, &HistoryQuery::default())
        .await
        .unwrap();
    assert!(
        received
            .iter()
            .any(|t| t.tx_type == TransactionType::PeerTransferReceived)
    );
}

#[tokio::test]
async fn transfer_without_funds_leaves_no_trace() {
    let alice = Employee::new("alice@guin.co", false);
    let bob = Employee::new("bob@guin.co", false);
    let h = harness(vec![alice.clone(), bob.clone()]);
    let alice_account = fund(&h, &alice, Coins::from_major(10)).await;
    fund(&h, &bob, Coins::ZERO).await;

    let result = h
        .transfers
        .transfer(alice.id, "bob@guin.co", Coins::from_major(30), "oops")
        .await;
    assert!(matches!(result, Err(LedgerError::InsufficientBalance)));

    let balance = h.ledger.balance(alice_account, true).await.unwrap();
    assert_eq!(balance.posted, Coins::from_major(10));
    assert_eq!(balance.pending, Coins::ZERO);

    // Only the opening adjustment is on the books.
    let history = h
        .ledger
        .history(alice_account, &HistoryQuery::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tx_type, TransactionType::Adjustment);
}

#[tokio::test]
async fn transfer_to_unregistered_recipient_is_escrowed() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    let alice_account = fund(&h, &alice, Coins::from_major(100)).await;

    let outcome = h
        .transfers
        .transfer(
            alice.id,
            "Carol@guin.co",
            Coins::from_major(30),
            "welcome aboard",
        )
        .await
        .unwrap();

    assert!(outcome.is_pending());
    assert_eq!(outcome.sender_balance().posted, Coins::from_major(70));

    let pending = h
        .ledger
        .store()
        .pending_transfers_for("carol@guin.co")
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].amount, Coins::from_major(30));
    assert_eq!(pending[0].sender_employee, alice.id);

    // The debit leg posted even though the credit is escrowed.
    let balance = h.ledger.balance(alice_account, true).await.unwrap();
    assert_eq!(balance.posted, Coins::from_major(70));
}

#[tokio::test]
async fn claim_credits_escrowed_transfers_exactly_once() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    fund(&h, &alice, Coins::from_major(100)).await;

    h.transfers
        .transfer(alice.id, "carol@guin.co", Coins::from_major(30), "welcome")
        .await
        .unwrap();

    let carol = Uuid::now_v7();
    let summary = h.claims.claim_for(carol, "carol@guin.co").await.unwrap();
    assert_eq!(summary.credited.len(), 1);
    assert_eq!(summary.total, Coins::from_major(30));
    assert_eq!(summary.skipped, 0);

    let carol_account = h
        .ledger
        .store()
        .find_account(&AccountOwner::Employee(carol))
        .await
        .unwrap()
        .unwrap();
    let balance = h.ledger.balance(carol_account.id, true).await.unwrap();
    assert_eq!(balance.posted, Coins::from_major(30));

    assert!(
        h.ledger
            .store()
            .pending_transfers_for("carol@guin.co")
            .await
            .unwrap()
            .is_empty()
    );

    // A retried claim finds nothing and credits nothing.
    let again = h.claims.claim_for(carol, "carol@guin.co").await.unwrap();
    assert!(again.credited.is_empty());
    assert_eq!(again.total, Coins::ZERO);
    let balance = h.ledger.balance(carol_account.id, true).await.unwrap();
    assert_eq!(balance.posted, Coins::from_major(30));
}

#[tokio::test]
async fn award_is_rejected_when_budget_is_short() {
    let mia = Employee::new("mia@guin.co", true);
    let dev = Employee::new("dev@guin.co", false);
    let h = harness(vec![mia.clone(), dev.clone()]);
    let dev_account = fund(&h, &dev, Coins::ZERO).await;

    h.allotments
        .deposit_allotment(mia.id, Coins::from_major(20), "monthly budget", None)
        .await
        .unwrap();

    let result = h
        .allotments
        .award_coins(mia.id, "dev@guin.co", Coins::from_major(25), "ship it")
        .await;
    assert!(matches!(result, Err(LedgerError::BudgetExceeded)));

    // Nothing moved.
    let view = h.allotments.current_allotment(mia.id).await.unwrap();
    assert_eq!(view.balance, Coins::from_major(20));
    assert_eq!(view.remaining, Coins::from_major(20));
    assert_eq!(
        h.ledger.balance(dev_account, true).await.unwrap().posted,
        Coins::ZERO
    );

    let receipt = h
        .allotments
        .award_coins(mia.id, "dev@guin.co", Coins::from_major(15), "ship it")
        .await
        .unwrap();
    assert_eq!(receipt.remaining, Coins::from_major(5));
    assert_eq!(receipt.credit.tx_type, TransactionType::ManagerAward);
    assert_eq!(
        h.ledger.balance(dev_account, true).await.unwrap().posted,
        Coins::from_major(15)
    );

    let view = h.allotments.current_allotment(mia.id).await.unwrap();
    assert_eq!(view.used_this_period, Coins::from_major(15));
}

#[tokio::test]
async fn award_requires_manager_flag() {
    let notmgr = Employee::new("dev1@guin.co", false);
    let dev = Employee::new("dev2@guin.co", false);
    let h = harness(vec![notmgr.clone(), dev]);

    let result = h
        .allotments
        .award_coins(notmgr.id, "dev2@guin.co", Coins::from_major(5), "thanks")
        .await;
    assert!(matches!(result, Err(LedgerError::NotAManager(_))));
}

#[tokio::test]
async fn can_award_is_advisory() {
    let mia = Employee::new("mia@guin.co", true);
    let h = harness(vec![mia.clone()]);

    assert!(!h.allotments.can_award(mia.id, Coins::from_major(1)).await.unwrap());
    h.allotments
        .deposit_allotment(mia.id, Coins::from_major(10), "budget", None)
        .await
        .unwrap();
    assert!(h.allotments.can_award(mia.id, Coins::from_major(10)).await.unwrap());
    assert!(!h.allotments.can_award(mia.id, Coins::from_major(11)).await.unwrap());
    assert!(!h.allotments.can_award(mia.id, Coins::ZERO).await.unwrap());
}

#[tokio::test]
async fn concurrent_transfers_cannot_overdraw() {
    let alice = Employee::new("alice@guin.co", false);
    let bob = Employee::new("bob@guin.co", false);
    let h = harness(vec![alice.clone(), bob.clone()]);
    let alice_account = fund(&h, &alice, Coins::from_major(100)).await;
    fund(&h, &bob, Coins::ZERO).await;

    let t1 = h.transfers.clone();
    let t2 = h.transfers.clone();
    let sender = alice.id;
    let (first, second) = tokio::join!(
        tokio::spawn(
            async move { t1.transfer(sender, "bob@guin.co", Coins::from_major(60), "a").await }
        ),
        tokio::spawn(
            async move { t2.transfer(sender, "bob@guin.co", Coins::from_major(60), "b").await }
        ),
    );
    let results = [first.unwrap(), second.unwrap()];

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::InsufficientBalance)))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(short, 1);

    let balance = h.ledger.balance(alice_account, true).await.unwrap();
    assert_eq!(balance.posted, Coins::from_major(40));
}

#[tokio::test]
async fn posting_applies_exactly_once() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    let account = fund(&h, &alice, Coins::ZERO).await;

    let tx = h
        .ledger
        .create_pending_transaction(
            account,
            TransactionType::WellnessReward,
            Coins::from_major(10),
            "held reward",
            None,
        )
        .await
        .unwrap();

    h.ledger.post_transaction(tx.id).await.unwrap();
    assert_eq!(
        h.ledger.balance(account, true).await.unwrap().posted,
        Coins::from_major(10)
    );

    let result = h.ledger.post_transaction(tx.id).await;
    assert!(matches!(result, Err(LedgerError::TransactionNotPending(_))));
    assert_eq!(
        h.ledger.balance(account, true).await.unwrap().posted,
        Coins::from_major(10)
    );

    let stored = h.ledger.store().get_transaction(tx.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Posted);
    assert!(stored.posted_at.is_some());
}

#[tokio::test]
async fn posting_a_pending_debit_spends_held_funds() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    let account = fund(&h, &alice, Coins::from_major(100)).await;

    // A held debit larger than half the balance still posts; the funds it
    // reserves are its own.
    let held = h
        .ledger
        .create_pending_transaction(
            account,
            TransactionType::StorePurchase,
            Coins::from_major(60),
            "held purchase",
            Some(alice.id),
        )
        .await
        .unwrap();
    h.ledger.post_transaction(held.id).await.unwrap();

    let balance = h.ledger.balance(account, true).await.unwrap();
    assert_eq!(balance.posted, Coins::from_major(40));
    assert_eq!(balance.pending, Coins::ZERO);

    // A second held debit beyond what is left cannot post and stays pending.
    let over = h
        .ledger
        .create_pending_transaction(
            account,
            TransactionType::StorePurchase,
            Coins::from_major(60),
            "too much",
            Some(alice.id),
        )
        .await
        .unwrap();
    let result = h.ledger.post_transaction(over.id).await;
    assert!(matches!(result, Err(LedgerError::InsufficientBalance)));

    let stored = h.ledger.store().get_transaction(over.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert_eq!(
        h.ledger.balance(account, false).await.unwrap().posted,
        Coins::from_major(40)
    );
}

#[tokio::test]
async fn concurrent_provisioning_yields_one_account() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);

    let l1 = h.ledger.clone();
    let l2 = h.ledger.clone();
    let owner = AccountOwner::Employee(alice.id);
    let (a, b) = tokio::join!(
        tokio::spawn(async move { l1.ensure_account(owner).await }),
        tokio::spawn(async move { l2.ensure_account(owner).await }),
    );
    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(h.ledger.all_accounts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_transactions_never_touch_the_balance() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    let account = fund(&h, &alice, Coins::from_major(50)).await;

    let tx = h
        .ledger
        .create_pending_transaction(
            account,
            TransactionType::StorePurchase,
            Coins::from_major(20),
            "cancelled order",
            Some(alice.id),
        )
        .await
        .unwrap();

    h.ledger.reject_transaction(tx.id).await.unwrap();
    assert_eq!(
        h.ledger.balance(account, true).await.unwrap().posted,
        Coins::from_major(50)
    );

    // Rejection is terminal.
    let result = h.ledger.post_transaction(tx.id).await;
    assert!(matches!(result, Err(LedgerError::TransactionNotPending(_))));
}

#[tokio::test]
async fn transfer_limit_counts_posted_and_pending() {
    let alice = Employee::new("alice@guin.co", false);
    let bob = Employee::new("bob@guin.co", false);
    let h = harness(vec![alice.clone(), bob.clone()]);
    fund(&h, &alice, Coins::from_major(200)).await;
    fund(&h, &bob, Coins::ZERO).await;

    h.ledger
        .store()
        .set_transfer_limit(guincoin_core::TransferLimit::monthly(
            alice.id,
            Coins::from_major(50),
        ))
        .await
        .unwrap();

    // Escrowed debit: counts toward the window even though the credit is
    // still pending a claim.
    h.transfers
        .transfer(alice.id, "newbie@guin.co", Coins::from_major(30), "hi")
        .await
        .unwrap();

    let result = h
        .transfers
        .transfer(alice.id, "bob@guin.co", Coins::from_major(30), "again")
        .await;
    assert!(matches!(result, Err(LedgerError::TransferLimitExceeded)));

    // Under the cap still goes through.
    h.transfers
        .transfer(alice.id, "bob@guin.co", Coins::from_major(20), "fits")
        .await
        .unwrap();
}

#[tokio::test]
async fn self_transfer_is_rejected_case_insensitively() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    fund(&h, &alice, Coins::from_major(10)).await;

    let result = h
        .transfers
        .transfer(alice.id, "Alice@Guin.Co", Coins::from_major(5), "me")
        .await;
    assert!(matches!(result, Err(LedgerError::SelfTransfer)));
}

#[tokio::test]
async fn escrow_respects_recipient_domain_restriction() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness_with_config(
        vec![alice.clone()],
        TransferConfig {
            allowed_recipient_domain: Some("guin.co".to_string()),
        },
    );
    fund(&h, &alice, Coins::from_major(50)).await;

    let result = h
        .transfers
        .transfer(alice.id, "stranger@other.com", Coins::from_major(5), "hi")
        .await;
    assert!(matches!(
        result,
        Err(LedgerError::RecipientDomainNotAllowed(_))
    ));

    let outcome = h
        .transfers
        .transfer(alice.id, "newbie@guin.co", Coins::from_major(5), "hi")
        .await
        .unwrap();
    assert!(outcome.is_pending());
}

#[tokio::test]
async fn negative_adjustment_cannot_overdraw() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    let account = fund(&h, &alice, Coins::from_major(10)).await;

    let result = h
        .ledger
        .post_adjustment(account, Coins::from_major(-50), "clawback")
        .await;
    assert!(matches!(result, Err(LedgerError::InsufficientBalance)));

    h.ledger
        .post_adjustment(account, Coins::from_major(-10), "clawback")
        .await
        .unwrap();
    assert_eq!(
        h.ledger.balance(account, true).await.unwrap().posted,
        Coins::ZERO
    );
}

#[tokio::test]
async fn recurring_deposit_is_idempotent_under_a_key() {
    let mia = Employee::new("mia@guin.co", true);
    let h = harness(vec![mia.clone()]);

    h.allotments
        .set_recurring_budget(mia.id, Coins::from_major(100))
        .await
        .unwrap();
    assert_eq!(
        h.ledger.store().recurring_budget(mia.id).await.unwrap(),
        Coins::from_major(100)
    );

    h.allotments
        .deposit_allotment(
            mia.id,
            Coins::from_major(100),
            "budget 2026-08",
            Some("allotment:2026-08"),
        )
        .await
        .unwrap();

    // Cron retry with the same key: rejected, balance credited once.
    let retry = h
        .allotments
        .deposit_allotment(
            mia.id,
            Coins::from_major(100),
            "budget 2026-08",
            Some("allotment:2026-08"),
        )
        .await;
    assert!(matches!(retry, Err(LedgerError::DuplicateIdempotencyKey)));

    let view = h.allotments.current_allotment(mia.id).await.unwrap();
    assert_eq!(view.balance, Coins::from_major(100));
}

#[tokio::test]
async fn wellness_rewards_and_purchases_round_the_loop() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);

    h.ledger
        .grant_reward(alice.id, Coins::from_major(40), "hydration streak")
        .await
        .unwrap();
    h.ledger
        .record_purchase(alice.id, Coins::from_major(15), "sticker pack")
        .await
        .unwrap();

    let account = h
        .ledger
        .store()
        .find_account(&AccountOwner::Employee(alice.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        h.ledger.balance(account.id, true).await.unwrap().posted,
        Coins::from_major(25)
    );

    let result = h
        .ledger
        .record_purchase(alice.id, Coins::from_major(100), "standing desk")
        .await;
    assert!(matches!(result, Err(LedgerError::InsufficientBalance)));
}

#[tokio::test]
async fn history_supports_paging_and_filters() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    let account = fund(&h, &alice, Coins::from_major(100)).await;

    for i in 0..5 {
        h.ledger
            .grant_reward(alice.id, Coins::from_major(1), format!("reward {i}"))
            .await
            .unwrap();
    }
    h.ledger
        .record_purchase(alice.id, Coins::from_major(2), "snack")
        .await
        .unwrap();

    let page = h
        .ledger
        .history(
            account,
            &HistoryQuery {
                limit: 3,
                ..HistoryQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.len(), 3);
    // Newest first.
    assert_eq!(page[0].tx_type, TransactionType::StorePurchase);

    let next = h
        .ledger
        .history(
            account,
            &HistoryQuery {
                limit: 3,
                offset: 3,
                ..HistoryQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(next.len(), 3);
    assert!(page.iter().all(|p| next.iter().all(|n| n.id != p.id)));

    let rewards = h
        .ledger
        .history(
            account,
            &HistoryQuery {
                tx_type: Some(TransactionType::WellnessReward),
                ..HistoryQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(rewards.len(), 5);

    let posted = h
        .ledger
        .history(
            account,
            &HistoryQuery {
                status: Some(TransactionStatus::Posted),
                ..HistoryQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(posted.len(), 7);
}

#[tokio::test]
async fn balance_command_reports_the_three_figures() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    fund(&h, &alice, Coins::from_major(100)).await;

    let result = h.commands.execute_balance("alice@guin.co").await;
    assert!(result.success);
    let data = result.data.unwrap();
    assert_eq!(data["posted"], 100.0);
    assert_eq!(data["pending"], 0.0);
    assert_eq!(data["total"], 100.0);

    // Unprovisioned employees read as zero, not as an error.
    let bob = Employee::new("bob@guin.co", false);
    let h = harness(vec![bob]);
    let result = h.commands.execute_balance("bob@guin.co").await;
    assert!(result.success);
    assert_eq!(result.data.unwrap()["total"], 0.0);

    let result = h.commands.execute_balance("ghost@guin.co").await;
    assert!(!result.success);
    assert_eq!(result.message, "Recipient could not be found.");
}

#[tokio::test]
async fn award_command_returns_remaining_budget() {
    let mia = Employee::new("mia@guin.co", true);
    let dev = Employee::new("dev@guin.co", false);
    let h = harness(vec![mia.clone(), dev]);
    h.allotments
        .deposit_allotment(mia.id, Coins::from_major(50), "budget", None)
        .await
        .unwrap();

    let result = h
        .commands
        .execute_award("mia@guin.co", "dev@guin.co", "20", "great sprint")
        .await;
    assert!(result.success, "{}", result.message);
    assert!(result.transaction_id.is_some());
    assert_eq!(result.data.unwrap()["remaining"], 30.0);

    let result = h
        .commands
        .execute_award("mia@guin.co", "dev@guin.co", "forty", "typo")
        .await;
    assert!(!result.success);
}

#[tokio::test]
async fn failed_commands_never_leak_figures() {
    let alice = Employee::new("alice@guin.co", false);
    let bob = Employee::new("bob@guin.co", false);
    let h = harness(vec![alice.clone(), bob]);
    fund(&h, &alice, Coins::from_major(5)).await;

    let result = h
        .commands
        .execute_transfer("alice@guin.co", "bob@guin.co", "500", "too much")
        .await;
    assert!(!result.success);
    assert!(result.data.is_none());
    assert!(
        !result.message.chars().any(|c| c.is_ascii_digit()),
        "{}",
        result.message
    );
}

#[tokio::test]
async fn transfer_command_reports_pending_state() {
    let alice = Employee::new("alice@guin.co", false);
    let h = harness(vec![alice.clone()]);
    fund(&h, &alice, Coins::from_major(50)).await;

    let result = h
        .commands
        .execute_transfer("alice@guin.co", "carol@guin.co", "12.50", "welcome")
        .await;
    assert!(result.success, "{}", result.message);
    let data = result.data.unwrap();
    assert_eq!(data["isPending"], true);
    assert_eq!(data["posted"], 37.5);

    let outcome = h
        .transfers
        .transfer(alice.id, "dana@guin.co", Coins::from_major(10), "hi")
        .await
        .unwrap();
    assert!(matches!(outcome, TransferOutcome::Escrowed { .. }));
}

#[tokio::test]
async fn recent_transactions_cover_all_accounts() {
    let alice = Employee::new("alice@guin.co", false);
    let bob = Employee::new("bob@guin.co", false);
    let h = harness(vec![alice.clone(), bob.clone()]);
    fund(&h, &alice, Coins::from_major(50)).await;
    fund(&h, &bob, Coins::from_major(50)).await;

    let since = chrono::Utc::now() - chrono::Duration::minutes(1);
    h.transfers
        .transfer(alice.id, "bob@guin.co", Coins::from_major(5), "hi")
        .await
        .unwrap();

    let recent = h.ledger.recent_transactions(since, 100).await.unwrap();
    // Two opening adjustments plus both transfer legs.
    assert_eq!(recent.len(), 4);
    assert_eq!(h.ledger.all_accounts().await.unwrap().len(), 2);
}
