use std::time::Duration;

use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::codec::{decode_feedback, FeedbackTuple};
use crate::dialer::Connect;
use crate::result::{Error, Result};

/// Drains the feedback service once and returns the decoded tuples.
///
/// Every call opens its own connection, reads until the remote closes, and
/// parses the accumulated bytes; Apple clears its backlog as it streams, so
/// losing the result loses the tokens. The whole operation is bounded by
/// `timeout`.
pub async fn read<C: Connect>(connector: &C, timeout: Duration) -> Result<Vec<FeedbackTuple>> {
    debug!("connecting to feedback service");

    let drain = async {
        let mut stream = connector.connect().await?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await?;
        Ok::<_, Error>(bytes)
    };

    let bytes = tokio::time::timeout(timeout, drain)
        .await
        .map_err(|_| Error::FeedbackTimeout(timeout.as_secs()))??;

    let tuples = decode_feedback(&bytes)?;
    info!(tuples = tuples.len(), "feedback stream drained");
    Ok(tuples)
}

#[cfg(test)]
mod tests {
    use std::io;

    use async_trait::async_trait;
    use bytes::BufMut;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::sync::Mutex;

    use super::*;

    const TOKEN: &str = "e6e9cf3d0405ee61eac9552a5a17bff62a64a131d03a2e1638d06c25e105c1e5";

    /// Hands out pre-created in-memory streams, one per connect call.
    struct StaticConnect {
        streams: Mutex<Vec<DuplexStream>>,
    }

    impl StaticConnect {
        fn new(streams: Vec<DuplexStream>) -> Self {
            Self {
                streams: Mutex::new(streams),
            }
        }
    }

    #[async_trait]
    impl Connect for StaticConnect {
        type Stream = DuplexStream;

        async fn connect(&self) -> io::Result<Self::Stream> {
            self.streams
                .lock()
                .await
                .pop()
                .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "no stream"))
        }
    }

    fn record(timestamp: u32) -> Vec<u8> {
        let mut record = Vec::new();
        record.put_u32(timestamp);
        record.put_u16(32);
        record.extend_from_slice(&hex::decode(TOKEN).unwrap());
        record
    }

    #[tokio::test]
    async fn drains_and_decodes() {
        let (client, mut server) = tokio::io::duplex(1024);
        let connector = StaticConnect::new(vec![client]);

        let writer = tokio::spawn(async move {
            server.write_all(&record(42)).await.unwrap();
            server.write_all(&record(42)).await.unwrap();
            // Dropping the server half closes the stream.
        });

        let tuples = read(&connector, Duration::from_secs(5)).await.unwrap();
        writer.await.unwrap();

        assert_eq!(tuples.len(), 2);
        for tuple in &tuples {
            assert_eq!(tuple.timestamp.unix_timestamp(), 42);
            assert_eq!(tuple.token.to_hex(), TOKEN);
        }
    }

    #[tokio::test]
    async fn partial_record_is_malformed() {
        let (client, mut server) = tokio::io::duplex(1024);
        let connector = StaticConnect::new(vec![client]);

        let writer = tokio::spawn(async move {
            let mut bytes = record(42);
            bytes.truncate(10);
            server.write_all(&bytes).await.unwrap();
        });

        let result = read(&connector, Duration::from_secs(5)).await;
        writer.await.unwrap();
        assert!(matches!(result, Err(Error::MalformedFeedback)));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_service_times_out() {
        let (client, _server) = tokio::io::duplex(1024);
        let connector = StaticConnect::new(vec![client]);

        // The server half stays open and silent; only the timeout fires.
        let result = read(&connector, Duration::from_secs(15)).await;
        assert!(matches!(result, Err(Error::FeedbackTimeout(15))));
    }

    #[tokio::test]
    async fn concurrent_reads_use_distinct_connections() {
        let (client_a, mut server_a) = tokio::io::duplex(1024);
        let (client_b, mut server_b) = tokio::io::duplex(1024);
        let connector = std::sync::Arc::new(StaticConnect::new(vec![client_a, client_b]));

        let writers = tokio::spawn(async move {
            server_a.write_all(&record(1)).await.unwrap();
            server_b.write_all(&record(2)).await.unwrap();
        });

        let (first, second) = tokio::join!(
            read(connector.as_ref(), Duration::from_secs(5)),
            read(connector.as_ref(), Duration::from_secs(5)),
        );
        writers.await.unwrap();

        let mut stamps = vec![
            first.unwrap()[0].timestamp.unix_timestamp(),
            second.unwrap()[0].timestamp.unix_timestamp(),
        ];
        stamps.sort_unstable();
        assert_eq!(stamps, [1, 2]);
    }
}
