//! In-memory `Store` for tests. Mirrors the Postgres schema's uniqueness
//! rules and the all-or-nothing registration unit.

use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{repo::UserRepo, repo_types::User},
    billing::{
        repo::BillingRepo,
        repo_types::{Payment, PaymentStatus, SubscriptionPlan, UserSubscription},
    },
    db::{DbError, DbResult, Pagination, Store},
    feedback::{Feedback, FeedbackRepo},
    reports::{ReportRepo, SalesSummary},
    resources::{
        customers::Customer, invoices::Invoice, products::Product, tax_profiles::TaxProfile,
        Resource, ResourceRepo,
    },
    shops::{repo::ShopRepo, repo_types::Shop},
};

fn page<T>(rows: impl Iterator<Item = T>, p: Pagination) -> Vec<T> {
    rows.skip(p.offset.max(0) as usize)
        .take(p.limit.max(0) as usize)
        .collect()
}

#[derive(Default)]
struct Accounts {
    shops: Vec<Shop>,
    users: Vec<User>,
}

impl Accounts {
    /// Name of the unique constraint `candidate` would break, if any.
    fn conflict(&self, candidate: &User) -> Option<&'static str> {
        let email = candidate.email.to_lowercase();
        for u in self.users.iter().filter(|u| u.id != candidate.id) {
            if u.username == candidate.username {
                return Some("users_username_key");
            }
            if !email.is_empty() && u.email.to_lowercase() == email {
                return Some("users_email_key");
            }
        }
        None
    }

    fn insert_user(&mut self, user: &User, entity: &'static str) -> DbResult<()> {
        if let Some(constraint) = self.conflict(user) {
            return Err(DbError::UniqueViolation {
                entity,
                constraint: constraint.into(),
            });
        }
        self.users.push(user.clone());
        Ok(())
    }
}

pub struct MemTable<R>(Mutex<Vec<R>>);

impl<R> Default for MemTable<R> {
    fn default() -> Self {
        Self(Mutex::new(Vec::new()))
    }
}

#[async_trait]
impl<R: Resource> ResourceRepo<R> for MemTable<R> {
    async fn list(&self, shop_id: Uuid, p: Pagination) -> DbResult<Vec<R>> {
        let mut rows: Vec<R> = self
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.shop_id() == shop_id)
            .cloned()
            .collect();
        rows.sort_by(R::listing_order);
        Ok(page(rows.into_iter(), p))
    }

    async fn get(&self, shop_id: Uuid, id: Uuid) -> DbResult<Option<R>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id() == id && r.shop_id() == shop_id)
            .cloned())
    }

    async fn insert(&self, record: &R) -> DbResult<R> {
        self.0.lock().unwrap().push(record.clone());
        Ok(record.clone())
    }

    async fn update(&self, record: &R) -> DbResult<Option<R>> {
        let mut rows = self.0.lock().unwrap();
        let Some(slot) = rows
            .iter_mut()
            .find(|r| r.id() == record.id() && r.shop_id() == record.shop_id())
        else {
            return Ok(None);
        };
        *slot = record.clone();
        Ok(Some(record.clone()))
    }

    async fn delete(&self, shop_id: Uuid, id: Uuid) -> DbResult<bool> {
        let mut rows = self.0.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !(r.id() == id && r.shop_id() == shop_id));
        Ok(rows.len() < before)
    }
}

#[derive(Default)]
struct Billing {
    plans: Vec<SubscriptionPlan>,
    payments: Vec<Payment>,
    subscriptions: Vec<UserSubscription>,
}

#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<Accounts>,
    products: MemTable<Product>,
    customers: MemTable<Customer>,
    invoices: MemTable<Invoice>,
    tax_profiles: MemTable<TaxProfile>,
    billing: Mutex<Billing>,
    feedback: Mutex<Vec<Feedback>>,
}

impl MemoryStore {
    pub fn shop_count(&self) -> usize {
        self.accounts.lock().unwrap().shops.len()
    }

    pub fn user_count(&self) -> usize {
        self.accounts.lock().unwrap().users.len()
    }

    pub fn add_plan(&self, plan: SubscriptionPlan) {
        self.billing.lock().unwrap().plans.push(plan);
    }
}

impl Store for MemoryStore {
    fn users(&self) -> &dyn UserRepo {
        self
    }
    fn shops(&self) -> &dyn ShopRepo {
        self
    }
    fn products(&self) -> &dyn ResourceRepo<Product> {
        &self.products
    }
    fn customers(&self) -> &dyn ResourceRepo<Customer> {
        &self.customers
    }
    fn invoices(&self) -> &dyn ResourceRepo<Invoice> {
        &self.invoices
    }
    fn tax_profiles(&self) -> &dyn ResourceRepo<TaxProfile> {
        &self.tax_profiles
    }
    fn reports(&self) -> &dyn ReportRepo {
        self
    }
    fn billing(&self) -> &dyn BillingRepo {
        self
    }
    fn feedback(&self) -> &dyn FeedbackRepo {
        self
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let email = email.to_lowercase();
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts
            .users
            .iter()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn username_exists(&self, username: &str) -> DbResult<bool> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.users.iter().any(|u| u.username == username))
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> DbResult<()> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(u) = accounts.users.iter_mut().find(|u| u.id == id) {
            u.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn list_in_shop(&self, shop_id: Uuid, exclude: Uuid, p: Pagination) -> DbResult<Vec<User>> {
        let accounts = self.accounts.lock().unwrap();
        let rows = accounts
            .users
            .iter()
            .filter(|u| u.shop_id == Some(shop_id) && u.id != exclude)
            .cloned();
        Ok(page(rows, p))
    }

    async fn get_in_shop(&self, shop_id: Uuid, id: Uuid) -> DbResult<Option<User>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts
            .users
            .iter()
            .find(|u| u.id == id && u.shop_id == Some(shop_id))
            .cloned())
    }

    async fn insert(&self, user: &User) -> DbResult<User> {
        self.accounts.lock().unwrap().insert_user(user, "user")?;
        Ok(user.clone())
    }

    async fn update_in_shop(&self, user: &User) -> DbResult<Option<User>> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(constraint) = accounts.conflict(user) {
            return Err(DbError::UniqueViolation {
                entity: "user",
                constraint: constraint.into(),
            });
        }
        let Some(slot) = accounts
            .users
            .iter_mut()
            .find(|u| u.id == user.id && u.shop_id.is_some() && u.shop_id == user.shop_id)
        else {
            return Ok(None);
        };
        *slot = user.clone();
        Ok(Some(user.clone()))
    }

    async fn delete_in_shop(&self, shop_id: Uuid, id: Uuid) -> DbResult<bool> {
        let mut accounts = self.accounts.lock().unwrap();
        let before = accounts.users.len();
        accounts
            .users
            .retain(|u| !(u.id == id && u.shop_id == Some(shop_id)));
        Ok(accounts.users.len() < before)
    }
}

#[async_trait]
impl ShopRepo for MemoryStore {
    async fn get(&self, id: Uuid) -> DbResult<Option<Shop>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.shops.iter().find(|s| s.id == id).cloned())
    }

    async fn update(&self, shop: &Shop) -> DbResult<Option<Shop>> {
        let mut accounts = self.accounts.lock().unwrap();
        let Some(slot) = accounts.shops.iter_mut().find(|s| s.id == shop.id) else {
            return Ok(None);
        };
        *slot = shop.clone();
        Ok(Some(shop.clone()))
    }

    async fn register(&self, shop: &Shop, owner: &User, shopkeeper: Option<&User>) -> DbResult<()> {
        let mut accounts = self.accounts.lock().unwrap();
        // Work on a copy and swap it in only when every insert succeeded.
        let mut staged = Accounts {
            shops: accounts.shops.clone(),
            users: accounts.users.clone(),
        };
        staged.shops.push(shop.clone());
        staged.insert_user(owner, "owner")?;
        if let Some(shopkeeper) = shopkeeper {
            staged.insert_user(shopkeeper, "shopkeeper")?;
        }
        *accounts = staged;
        Ok(())
    }
}

#[async_trait]
impl ReportRepo for MemoryStore {
    async fn sales_summary(&self, shop_id: Uuid) -> DbResult<SalesSummary> {
        let rows = self.invoices.0.lock().unwrap();
        let mine = rows.iter().filter(|i| i.shop_id == shop_id);
        Ok(SalesSummary {
            total_sales: mine.clone().map(|i| i.grand_total).sum::<Decimal>(),
            total_invoices: mine.count() as i64,
        })
    }
}

#[async_trait]
impl BillingRepo for MemoryStore {
    async fn list_active_plans(&self) -> DbResult<Vec<SubscriptionPlan>> {
        let billing = self.billing.lock().unwrap();
        let mut plans: Vec<_> = billing.plans.iter().filter(|p| p.is_active).cloned().collect();
        plans.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    async fn find_plan(&self, id: Uuid) -> DbResult<Option<SubscriptionPlan>> {
        let billing = self.billing.lock().unwrap();
        Ok(billing.plans.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_payment(&self, payment: &Payment) -> DbResult<Payment> {
        let mut billing = self.billing.lock().unwrap();
        if billing.payments.iter().any(|p| p.order_id == payment.order_id) {
            return Err(DbError::UniqueViolation {
                entity: "payment",
                constraint: "payments_order_id_key".into(),
            });
        }
        billing.payments.push(payment.clone());
        Ok(payment.clone())
    }

    async fn find_payment_by_order(&self, order_id: &str) -> DbResult<Option<Payment>> {
        let billing = self.billing.lock().unwrap();
        Ok(billing.payments.iter().find(|p| p.order_id == order_id).cloned())
    }

    async fn list_payments(&self, user_id: Uuid, p: Pagination) -> DbResult<Vec<Payment>> {
        let billing = self.billing.lock().unwrap();
        let mut rows: Vec<_> = billing
            .payments
            .iter()
            .filter(|pay| pay.user_id == user_id)
            .cloned()
            .collect();
        rows.reverse();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows.into_iter(), p))
    }

    async fn mark_payment_failed(&self, order_id: &str, payment_id: Option<&str>) -> DbResult<bool> {
        let mut billing = self.billing.lock().unwrap();
        let Some(payment) = billing
            .payments
            .iter_mut()
            .find(|p| p.order_id == order_id && p.status == PaymentStatus::Created)
        else {
            return Ok(false);
        };
        payment.status = PaymentStatus::Failed;
        if let Some(id) = payment_id {
            payment.payment_id = Some(id.to_string());
        }
        Ok(true)
    }

    async fn complete_payment(
        &self,
        payment: &Payment,
        payment_id: &str,
        duration_days: i32,
        now: OffsetDateTime,
    ) -> DbResult<bool> {
        let mut billing = self.billing.lock().unwrap();
        let Some(stored) = billing
            .payments
            .iter_mut()
            .find(|p| p.order_id == payment.order_id && p.status != PaymentStatus::Paid)
        else {
            return Ok(false);
        };
        stored.status = PaymentStatus::Paid;
        stored.payment_id = Some(payment_id.to_string());

        let idx = match billing
            .subscriptions
            .iter()
            .position(|s| s.user_id == payment.user_id)
        {
            Some(idx) => idx,
            None => {
                billing
                    .subscriptions
                    .push(UserSubscription::empty(payment.user_id));
                billing.subscriptions.len() - 1
            }
        };
        billing.subscriptions[idx].extend(now, payment.plan_id, i64::from(duration_days));
        Ok(true)
    }

    async fn find_subscription(&self, user_id: Uuid) -> DbResult<Option<UserSubscription>> {
        let billing = self.billing.lock().unwrap();
        Ok(billing
            .subscriptions
            .iter()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn insert_subscription_if_absent(&self, sub: &UserSubscription) -> DbResult<UserSubscription> {
        let mut billing = self.billing.lock().unwrap();
        if let Some(existing) = billing.subscriptions.iter().find(|s| s.user_id == sub.user_id) {
            return Ok(existing.clone());
        }
        billing.subscriptions.push(sub.clone());
        Ok(sub.clone())
    }

    async fn save_subscription(&self, sub: &UserSubscription) -> DbResult<()> {
        let mut billing = self.billing.lock().unwrap();
        match billing.subscriptions.iter_mut().find(|s| s.user_id == sub.user_id) {
            Some(slot) => {
                let admin_override = slot.admin_override;
                *slot = sub.clone();
                slot.admin_override = admin_override;
            }
            None => billing.subscriptions.push(sub.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl FeedbackRepo for MemoryStore {
    async fn list_for_user(&self, user_id: Uuid, p: Pagination) -> DbResult<Vec<Feedback>> {
        let rows = self.feedback.lock().unwrap();
        let mut mine: Vec<_> = rows.iter().filter(|f| f.user_id == user_id).cloned().collect();
        mine.reverse();
        Ok(page(mine.into_iter(), p))
    }

    async fn get_for_user(&self, user_id: Uuid, id: Uuid) -> DbResult<Option<Feedback>> {
        let rows = self.feedback.lock().unwrap();
        Ok(rows
            .iter()
            .find(|f| f.id == id && f.user_id == user_id)
            .cloned())
    }

    async fn insert(&self, feedback: &Feedback) -> DbResult<Feedback> {
        self.feedback.lock().unwrap().push(feedback.clone());
        Ok(feedback.clone())
    }

    async fn delete_for_user(&self, user_id: Uuid, id: Uuid) -> DbResult<bool> {
        let mut rows = self.feedback.lock().unwrap();
        let before = rows.len();
        rows.retain(|f| !(f.id == id && f.user_id == user_id));
        Ok(rows.len() < before)
    }
}
