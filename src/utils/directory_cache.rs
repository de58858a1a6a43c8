use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::model::employee::{Employee, EmployeeCard};
use crate::repo::employee as employee_repo;

/// employee id => display card
static DIRECTORY: Lazy<Cache<u64, EmployeeCard>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(50_000)
        .time_to_live(Duration::from_secs(3600))
        .build()
});

pub async fn remember(card: EmployeeCard) {
    DIRECTORY.insert(card.id, card).await;
}

/// Cached card for `employee_id`, loading it from the database on a miss
pub async fn card(pool: &MySqlPool, employee_id: u64) -> Result<Option<EmployeeCard>, sqlx::Error> {
    if let Some(card) = DIRECTORY.get(&employee_id).await {
        return Ok(Some(card));
    }

    let card = employee_repo::find(pool, employee_id)
        .await?
        .map(|e| e.card());

    if let Some(card) = &card {
        remember(card.clone()).await;
    }

    Ok(card)
}

async fn batch_remember(employees: &[Employee]) {
    let futures: Vec<_> = employees
        .iter()
        .map(|e| DIRECTORY.insert(e.id, e.card()))
        .collect();

    futures::future::join_all(futures).await;
}

/// Streams active employees into the cache in batches
pub async fn warmup_directory_cache(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = employee_repo::stream_active(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        batch.push(row?);
        total += 1;

        if batch.len() >= batch_size {
            batch_remember(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        batch_remember(&batch).await;
    }

    tracing::info!(total, "Employee directory cache warmup complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn remembered_cards_are_served_without_a_database() {
        let card = EmployeeCard {
            id: 9_000_001,
            employee_code: "EMP-T1".into(),
            name: "Test Person".into(),
            department: None,
            job_title: None,
        };
        remember(card.clone()).await;
        assert_eq!(DIRECTORY.get(&card.id).await, Some(card));
    }
}
