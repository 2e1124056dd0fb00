use crate::{
    db_types::{BankDetails, Bot, MinorUnits, NewBot, NewUser, Principal, Role, User},
    traits::AccountManagement,
    SqliteDatabase,
};

/// A small marketplace: one bot listed by an admin, two prospective buyers and a superadmin.
pub struct Marketplace {
    pub superadmin: User,
    pub seller: User,
    pub buyer: User,
    pub other_buyer: User,
    /// Price 500.00, rent 50.00
    pub bot: Bot,
}

impl Marketplace {
    pub fn principal(user: &User) -> Principal {
        Principal::new(user.id, user.email.as_str(), user.role)
    }
}

/// Seeds the marketplace. With `bank_details`, the seller has complete payout details on file but no subaccount yet.
pub async fn seed_marketplace(db: &SqliteDatabase, bank_details: bool) -> Marketplace {
    let superadmin = db.create_user(NewUser::new("Root", "root@example.com", Role::SuperAdmin)).await.unwrap();
    let seller = db.create_user(NewUser::new("Sally Seller", "sally@example.com", Role::Admin)).await.unwrap();
    let buyer = db.create_user(NewUser::new("Bob Buyer", "bob@example.com", Role::User)).await.unwrap();
    let other_buyer = db.create_user(NewUser::new("Carol Buyer", "carol@example.com", Role::User)).await.unwrap();
    if bank_details {
        let details = BankDetails {
            bank_code: "058".into(),
            account_number: "0123456789".into(),
            account_name: "Sally Seller".into(),
        };
        db.upsert_bank_details(seller.id, details).await.unwrap();
    }
    let bot = NewBot::new("Grid Trader", MinorUnits::from_major(500), MinorUnits::from_major(50), seller.id);
    let bot = db.create_bot(bot).await.unwrap();
    Marketplace { superadmin, seller, buyer, other_buyer, bot }
}
