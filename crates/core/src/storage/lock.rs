use anyhow::Context;

// Advisory locks are scoped to the Postgres session, so acquire and release
// must happen on the same connection; the signatures take a `PgConnection`
// to make a pooled mismatch impossible. Scheduled jobs use them as a
// best-effort guard so two ticks of the same job never overlap.
const LOCK_NAMESPACE: i64 = 0x464F_4C49_4F; // "FOLIO"

fn lock_key_for_job(job: &str) -> i64 {
    // FNV-1a over the job name, folded into the namespace.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in job.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    LOCK_NAMESPACE ^ (hash as i64)
}

pub async fn try_acquire_job_lock(
    conn: &mut sqlx::PgConnection,
    job: &str,
) -> anyhow::Result<bool> {
    let key = lock_key_for_job(job);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (job={job}, key={key})"))?;
    Ok(acquired.0)
}

/// Returns false when the session did not hold the lock.
pub async fn release_job_lock(conn: &mut sqlx::PgConnection, job: &str) -> anyhow::Result<bool> {
    let key = lock_key_for_job(job);
    let released: (bool,) = sqlx::query_as("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(conn)
        .await
        .with_context(|| format!("failed to release advisory lock (job={job}, key={key})"))?;
    Ok(released.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_jobs_get_distinct_keys() {
        assert_ne!(lock_key_for_job("trend"), lock_key_for_job("earnings"));
        assert_eq!(lock_key_for_job("alert"), lock_key_for_job("alert"));
    }
}
