use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::db_types::{EntitlementGrant, MinorUnits, Transaction, TransactionStatus};

/// Revenue attributed to one admin across their successful charges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminTotals {
    pub admin_id: i64,
    pub total_sales: MinorUnits,
    pub company_share: MinorUnits,
    pub admin_share: MinorUnits,
    pub transactions: i64,
}

/// The full ledger with revenue totals. Only `success` transactions count towards the totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub transactions: Vec<Transaction>,
    pub total_sales: MinorUnits,
    pub total_company_share: MinorUnits,
    pub total_admin_share: MinorUnits,
    pub total_transactions: i64,
    pub by_admin: Vec<AdminTotals>,
}

impl TransactionSummary {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        let mut summary = Self::default();
        let mut by_admin = BTreeMap::<i64, AdminTotals>::new();
        for tx in transactions.iter().filter(|tx| tx.status == TransactionStatus::Success) {
            summary.total_sales += tx.amount;
            summary.total_company_share += tx.company_share;
            summary.total_admin_share += tx.admin_share;
            summary.total_transactions += 1;
            let totals =
                by_admin.entry(tx.admin_id).or_insert_with(|| AdminTotals { admin_id: tx.admin_id, ..Default::default() });
            totals.total_sales += tx.amount;
            totals.company_share += tx.company_share;
            totals.admin_share += tx.admin_share;
            totals.transactions += 1;
        }
        summary.by_admin = by_admin.into_values().collect();
        summary.transactions = transactions;
        summary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessStatus {
    pub bot_id: i64,
    pub has_access: bool,
    /// The grant that provides access, if any
    pub grant: Option<EntitlementGrant>,
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::db_types::PaymentType;

    fn tx(id: i64, admin_id: i64, amount: i64, company: i64, status: TransactionStatus) -> Transaction {
        let now = Utc::now();
        Transaction {
            id,
            user_id: 100,
            admin_id,
            bot_id: 1,
            amount: MinorUnits::from(amount),
            company_share: MinorUnits::from(company),
            admin_share: MinorUnits::from(amount - company),
            company_percent: 30,
            reference: format!("ALG_100_{id}_000000"),
            status,
            payment_channel: "paystack".into(),
            payment_type: PaymentType::Purchase,
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_successful_transactions_count() {
        let summary = TransactionSummary::new(vec![
            tx(1, 2, 500, 150, TransactionStatus::Success),
            tx(2, 2, 50, 10, TransactionStatus::Success),
            tx(3, 3, 1000, 300, TransactionStatus::Pending),
            tx(4, 3, 200, 200, TransactionStatus::Success),
            tx(5, 3, 700, 210, TransactionStatus::Failed),
        ]);
        assert_eq!(summary.transactions.len(), 5);
        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.total_sales, MinorUnits::from(750));
        assert_eq!(summary.total_company_share, MinorUnits::from(360));
        assert_eq!(summary.total_admin_share, MinorUnits::from(390));
        assert_eq!(summary.by_admin, vec![
            AdminTotals {
                admin_id: 2,
                total_sales: MinorUnits::from(550),
                company_share: MinorUnits::from(160),
                admin_share: MinorUnits::from(390),
                transactions: 2
            },
            AdminTotals {
                admin_id: 3,
                total_sales: MinorUnits::from(200),
                company_share: MinorUnits::from(200),
                admin_share: MinorUnits::from(0),
                transactions: 1
            },
        ]);
    }
}
