//! Postgres-backed billing stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use advoca_shared::{CustomerId, InvoiceId, PaymentId, SubscriptionId, TenantId};

use crate::customer::{Address, Customer};
use crate::error::{BillingError, BillingResult};
use crate::invoice::Invoice;
use crate::payment::Payment;
use crate::store::{CustomerStore, InvoiceStore, PaymentStore};

fn parse_field<T>(value: &str, field: &str) -> BillingResult<T>
where
    T: std::str::FromStr,
{
    value
        .parse()
        .map_err(|_| BillingError::Database(format!("invalid {} value: {}", field, value)))
}

pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn payment_from_row(row: &PgRow) -> BillingResult<Payment> {
    let method: String = row.try_get("method")?;
    let status: String = row.try_get("status")?;
    Ok(Payment {
        id: PaymentId::from(row.try_get::<uuid::Uuid, _>("id")?),
        tenant_id: TenantId::from(row.try_get::<uuid::Uuid, _>("tenant_id")?),
        subscription_id: SubscriptionId::from(row.try_get::<uuid::Uuid, _>("subscription_id")?),
        invoice_id: row
            .try_get::<Option<uuid::Uuid>, _>("invoice_id")?
            .map(InvoiceId::from),
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        method: parse_field(&method, "payment method")?,
        status: parse_field(&status, "payment status")?,
        description: row.try_get("description")?,
        fiat_payment_id: row.try_get("fiat_payment_id")?,
        crypto_payment_id: row.try_get("crypto_payment_id")?,
        transaction_id: row.try_get("transaction_id")?,
        due_date: row.try_get("due_date")?,
        paid_at: row.try_get("paid_at")?,
        retry_count: row.try_get("retry_count")?,
        next_retry_at: row.try_get("next_retry_at")?,
        failure_reason: row.try_get("failure_reason")?,
        refunded_at: row.try_get("refunded_at")?,
        refund_amount: row.try_get("refund_amount")?,
        crypto_address: row.try_get("crypto_address")?,
        crypto_amount: row.try_get("crypto_amount")?,
        crypto_tx_hash: row.try_get("crypto_tx_hash")?,
        exchange_rate: row.try_get("exchange_rate")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn insert(&self, payment: &Payment) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, tenant_id, subscription_id, invoice_id, amount, currency,
                method, status, description, fiat_payment_id, crypto_payment_id,
                transaction_id, due_date, paid_at, retry_count, next_retry_at,
                failure_reason, refunded_at, refund_amount, crypto_address,
                crypto_amount, crypto_tx_hash, exchange_rate, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
            "#,
        )
        .bind(payment.id.0)
        .bind(payment.tenant_id.0)
        .bind(payment.subscription_id.0)
        .bind(payment.invoice_id.map(|id| id.0))
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.method.to_string())
        .bind(payment.status.to_string())
        .bind(&payment.description)
        .bind(&payment.fiat_payment_id)
        .bind(&payment.crypto_payment_id)
        .bind(&payment.transaction_id)
        .bind(payment.due_date)
        .bind(payment.paid_at)
        .bind(payment.retry_count)
        .bind(payment.next_retry_at)
        .bind(&payment.failure_reason)
        .bind(payment.refunded_at)
        .bind(payment.refund_amount)
        .bind(&payment.crypto_address)
        .bind(payment.crypto_amount)
        .bind(&payment.crypto_tx_hash)
        .bind(payment.exchange_rate)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> BillingResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET invoice_id = $2, status = $3, fiat_payment_id = $4,
                crypto_payment_id = $5, transaction_id = $6, paid_at = $7,
                retry_count = $8, next_retry_at = $9, failure_reason = $10,
                refunded_at = $11, refund_amount = $12, crypto_address = $13,
                crypto_amount = $14, crypto_tx_hash = $15, exchange_rate = $16,
                updated_at = $17
            WHERE id = $1
            "#,
        )
        .bind(payment.id.0)
        .bind(payment.invoice_id.map(|id| id.0))
        .bind(payment.status.to_string())
        .bind(&payment.fiat_payment_id)
        .bind(&payment.crypto_payment_id)
        .bind(&payment.transaction_id)
        .bind(payment.paid_at)
        .bind(payment.retry_count)
        .bind(payment.next_retry_at)
        .bind(&payment.failure_reason)
        .bind(payment.refunded_at)
        .bind(payment.refund_amount)
        .bind(&payment.crypto_address)
        .bind(payment.crypto_amount)
        .bind(&payment.crypto_tx_hash)
        .bind(payment.exchange_rate)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(BillingError::NotFound(format!("payment {}", payment.id)));
        }
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> BillingResult<Payment> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = $1")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        payment_from_row(&row)
    }

    async fn list_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> BillingResult<Vec<Payment>> {
        let rows =
            sqlx::query("SELECT * FROM payments WHERE subscription_id = $1 ORDER BY created_at")
                .bind(subscription_id.0)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(payment_from_row).collect()
    }

    async fn list_by_tenant(&self, tenant_id: TenantId) -> BillingResult<Vec<Payment>> {
        let rows = sqlx::query("SELECT * FROM payments WHERE tenant_id = $1 ORDER BY created_at")
            .bind(tenant_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(payment_from_row).collect()
    }

    async fn list_retry_due(&self, now: DateTime<Utc>) -> BillingResult<Vec<Payment>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM payments
            WHERE status = 'failed' AND retry_count < 3
              AND next_retry_at IS NOT NULL AND next_retry_at <= $1
            ORDER BY next_retry_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(payment_from_row).collect()
    }
}

pub struct PgCustomerStore {
    pool: PgPool,
}

impl PgCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn customer_from_row(row: &PgRow) -> BillingResult<Customer> {
    let address: Option<serde_json::Value> = row.try_get("address")?;
    let address: Option<Address> = address
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| BillingError::Database(format!("invalid customer address: {}", e)))?;
    Ok(Customer {
        id: CustomerId::from(row.try_get::<uuid::Uuid, _>("id")?),
        tenant_id: TenantId::from(row.try_get::<uuid::Uuid, _>("tenant_id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        document: row.try_get("document")?,
        phone: row.try_get("phone")?,
        address,
        gateway_customer_id: row.try_get("gateway_customer_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CustomerStore for PgCustomerStore {
    async fn insert(&self, customer: &Customer) -> BillingResult<()> {
        let address = customer
            .address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| BillingError::Database(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, tenant_id, name, email, document, phone, address,
                gateway_customer_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(customer.id.0)
        .bind(customer.tenant_id.0)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.document)
        .bind(&customer.phone)
        .bind(address)
        .bind(&customer.gateway_customer_id)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, customer: &Customer) -> BillingResult<()> {
        let address = customer
            .address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| BillingError::Database(e.to_string()))?;
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET name = $2, email = $3, document = $4, phone = $5, address = $6,
                gateway_customer_id = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(customer.id.0)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.document)
        .bind(&customer.phone)
        .bind(address)
        .bind(&customer.gateway_customer_id)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(BillingError::NotFound(format!("customer {}", customer.id)));
        }
        Ok(())
    }

    async fn get(&self, id: CustomerId) -> BillingResult<Customer> {
        let row = sqlx::query("SELECT * FROM customers WHERE id = $1")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        customer_from_row(&row)
    }

    async fn find_by_tenant(&self, tenant_id: TenantId) -> BillingResult<Option<Customer>> {
        let row = sqlx::query("SELECT * FROM customers WHERE tenant_id = $1")
            .bind(tenant_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(customer_from_row).transpose()
    }
}

pub struct PgInvoiceStore {
    pool: PgPool,
}

impl PgInvoiceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn invoice_from_row(row: &PgRow) -> BillingResult<Invoice> {
    let status: String = row.try_get("status")?;
    Ok(Invoice {
        id: InvoiceId::from(row.try_get::<uuid::Uuid, _>("id")?),
        tenant_id: TenantId::from(row.try_get::<uuid::Uuid, _>("tenant_id")?),
        subscription_id: SubscriptionId::from(row.try_get::<uuid::Uuid, _>("subscription_id")?),
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        status: parse_field(&status, "invoice status")?,
        description: row.try_get("description")?,
        due_date: row.try_get("due_date")?,
        paid_at: row.try_get("paid_at")?,
        invoice_url: row.try_get("invoice_url")?,
        bank_slip_url: row.try_get("bank_slip_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl InvoiceStore for PgInvoiceStore {
    async fn insert(&self, invoice: &Invoice) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, tenant_id, subscription_id, amount, currency, status,
                description, due_date, paid_at, invoice_url, bank_slip_url,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(invoice.id.0)
        .bind(invoice.tenant_id.0)
        .bind(invoice.subscription_id.0)
        .bind(invoice.amount)
        .bind(&invoice.currency)
        .bind(invoice.status.to_string())
        .bind(&invoice.description)
        .bind(invoice.due_date)
        .bind(invoice.paid_at)
        .bind(&invoice.invoice_url)
        .bind(&invoice.bank_slip_url)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, invoice: &Invoice) -> BillingResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = $2, paid_at = $3, invoice_url = $4, bank_slip_url = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(invoice.id.0)
        .bind(invoice.status.to_string())
        .bind(invoice.paid_at)
        .bind(&invoice.invoice_url)
        .bind(&invoice.bank_slip_url)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(BillingError::NotFound(format!("invoice {}", invoice.id)));
        }
        Ok(())
    }

    async fn get(&self, id: InvoiceId) -> BillingResult<Invoice> {
        let row = sqlx::query("SELECT * FROM invoices WHERE id = $1")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        invoice_from_row(&row)
    }

    async fn list_by_tenant(&self, tenant_id: TenantId) -> BillingResult<Vec<Invoice>> {
        let rows = sqlx::query("SELECT * FROM invoices WHERE tenant_id = $1 ORDER BY created_at")
            .bind(tenant_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(invoice_from_row).collect()
    }
}
