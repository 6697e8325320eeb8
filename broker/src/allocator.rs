use directory::DirectoryApi;
use ncore::Error;
use rand::Rng;
use tokio::net::TcpListener;

/// Inclusive-exclusive range random ports are drawn from for a fresh
/// allocation.
const PORT_MIN: u16 = 15000;
const PORT_MAX: u16 = 32767;

/// Number of bind-and-check attempts before giving up.
const MAX_ATTEMPTS: u32 = 20;

/// Resolve the public address a token should be reachable at (§4.3).
///
/// Sticky assignment: if the directory already maps `token` to an
/// address whose host is `wan_ip`, that address is reused without
/// touching `register_addr` again. Otherwise a fresh port is drawn,
/// test-bound, checked against the directory, and registered.
///
/// The retry-count check happens at the top of each loop iteration, and
/// a successful `register_addr` returns immediately — the off-by-one in
/// the revision this was distilled from (checking the retry count
/// *after* a successful register) is deliberately not reproduced here.
pub async fn resolve_public_addr<D: DirectoryApi>(
    token: &str,
    wan_ip: &str,
    directory: &D,
) -> Result<String, Error> {
    let status = directory.check_token(token).await?;

    if !status.addr.is_empty() {
        if let Some(host) = status.addr.rsplit_once(':').map(|(host, _)| host) {
            if host == wan_ip {
                return Ok(status.addr);
            }
        }
    }

    for _ in 0..MAX_ATTEMPTS {
        let port = rand::rng().random_range(PORT_MIN..PORT_MAX);

        if TcpListener::bind(("0.0.0.0", port)).await.is_err() {
            continue;
        }

        let addr = format!("{wan_ip}:{port}");
        if directory.is_addr_taken(&addr).await? {
            continue;
        }

        directory.register_addr(token, &addr).await?;
        return Ok(addr);
    }

    Err(Error::PortAllocationFailed)
}
