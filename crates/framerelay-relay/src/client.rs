use std::io::{Read, Write};
use std::net::Shutdown;
use std::path::Path;

use framerelay_frame::{FrameReader, FrameWriter};
use framerelay_transport::{IpcStream, UnixDomainSocket};
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::report::{Progress, RelayReport};
use crate::state::{advance, ClientState};

/// Writer side of the channel: re-frames an upstream stream onto the bridge.
pub struct RelayClient {
    writer: FrameWriter<IpcStream>,
    config: RelayConfig,
    state: ClientState,
}

impl RelayClient {
    /// Connect to a bridge that is already listening. One attempt, no retry.
    pub fn connect(path: impl AsRef<Path>, config: RelayConfig) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixDomainSocket::connect(path)?;
        let writer = FrameWriter::with_config(stream, config.frame.clone());
        info!(?path, "connected to bridge");

        Ok(Self {
            writer,
            config,
            state: ClientState::Connecting,
        })
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Relay every valid frame from `input` until it ends.
    ///
    /// Invalid frames are dropped (see [`framerelay_frame::InvalidFramePolicy`])
    /// and the connection stays open. A failed channel write ends the relay
    /// with [`RelayError::ChannelWrite`]. On success the write half of the
    /// channel is shut down so the bridge sees end-of-stream.
    pub fn forward<R: Read>(&mut self, input: R) -> Result<RelayReport> {
        advance(&mut self.state, ClientState::Relaying)?;

        let mut reader = FrameReader::with_config(input, self.config.frame.clone());
        let progress = Progress::new(self.config.progress_every);
        let result = forward_frames(&mut reader, &mut self.writer, &progress);
        advance(&mut self.state, ClientState::Closed)?;
        result?;

        if let Err(err) = self.writer.get_ref().shutdown(Shutdown::Write) {
            debug!(error = %err, "channel write shutdown failed");
        }

        let report = RelayReport::new(reader.stats(), progress.elapsed());
        info!(
            frames = report.frames,
            rejected = report.rejected,
            bytes = report.payload_bytes,
            "upstream ended; relay finished"
        );
        Ok(report)
    }
}

/// Copy frames from `reader` to `writer` until clean end-of-stream.
pub fn forward_frames<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    progress: &Progress,
) -> Result<()> {
    while let Some(frame) = reader.next_frame().map_err(RelayError::Upstream)? {
        writer
            .write_frame(&frame)
            .map_err(RelayError::ChannelWrite)?;
        progress.record(&reader.stats());
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::thread;

    use framerelay_frame::{FrameConfig, FrameError, InvalidFramePolicy, MAX_FRAME_BYTES};

    use super::*;

    fn make_sock_path(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/frc-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("channel.sock")
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn header_only(len: u32) -> Vec<u8> {
        len.to_le_bytes().to_vec()
    }

    /// Accepts one connection and collects every frame payload it carries.
    fn collecting_server(path: &Path) -> thread::JoinHandle<Vec<Vec<u8>>> {
        let listener = UnixDomainSocket::bind(path).expect("listener should bind");
        thread::spawn(move || {
            let stream = listener.accept_one().expect("accept should succeed");
            FrameReader::new(stream)
                .map(|frame| frame.expect("frame should decode").payload.to_vec())
                .collect()
        })
    }

    #[test]
    fn forwards_valid_frames_and_drops_invalid_ones() {
        let sock_path = make_sock_path("forward");
        let server = collecting_server(&sock_path);

        let first = vec![0x11; 100];
        let last = vec![0x22; 300];
        let mut input = framed(&first);
        input.extend(header_only(0));
        input.extend(header_only(MAX_FRAME_BYTES as u32 + 1));
        input.extend(framed(&last));

        let mut client =
            RelayClient::connect(&sock_path, RelayConfig::default()).expect("client should connect");
        let report = client.forward(Cursor::new(input)).expect("forward should succeed");

        assert_eq!(report.frames, 2);
        assert_eq!(report.rejected, 2);
        assert_eq!(report.payload_bytes, 400);
        assert_eq!(client.state(), ClientState::Closed);
        assert_eq!(server.join().unwrap(), vec![first, last]);

        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[test]
    fn connect_without_bridge_fails() {
        let sock_path = make_sock_path("nobridge");
        let err = RelayClient::connect(&sock_path, RelayConfig::default())
            .err()
            .expect("connect should fail");
        assert!(matches!(err, RelayError::Transport(_)));
        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[test]
    fn forward_is_single_use() {
        let sock_path = make_sock_path("twice");
        let server = collecting_server(&sock_path);

        let mut client =
            RelayClient::connect(&sock_path, RelayConfig::default()).expect("client should connect");
        client.forward(Cursor::new(framed(b"once"))).unwrap();
        let err = client.forward(Cursor::new(framed(b"again"))).unwrap_err();

        assert!(matches!(err, RelayError::InvalidTransition { .. }));
        assert_eq!(server.join().unwrap(), vec![b"once".to_vec()]);
        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[test]
    fn write_to_departed_bridge_is_fatal() {
        let sock_path = make_sock_path("gone");
        let listener = UnixDomainSocket::bind(&sock_path).expect("listener should bind");
        let bridge = thread::spawn(move || drop(listener.accept_one().unwrap()));

        let mut client =
            RelayClient::connect(&sock_path, RelayConfig::default()).expect("client should connect");
        bridge.join().unwrap();

        let mut input = Vec::new();
        for _ in 0..8 {
            input.extend(framed(&vec![0u8; 256 * 1024]));
        }
        let err = client.forward(Cursor::new(input)).unwrap_err();

        assert!(matches!(err, RelayError::ChannelWrite(_)));
        assert_eq!(client.state(), ClientState::Closed);
        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[test]
    fn forward_frames_preserves_order_and_bytes() {
        let payloads: Vec<Vec<u8>> = (1..=20u8).map(|n| vec![n; n as usize * 3]).collect();
        let input: Vec<u8> = payloads.iter().flat_map(|p| framed(p)).collect();

        let mut reader = FrameReader::new(Cursor::new(input.clone()));
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        forward_frames(&mut reader, &mut writer, &Progress::new(5)).unwrap();

        assert_eq!(writer.into_inner().into_inner(), input);
    }

    #[test]
    fn disconnect_policy_fails_on_invalid_upstream_frame() {
        let mut input = framed(b"ok");
        input.extend(header_only(0));

        let config = FrameConfig {
            invalid_frame_policy: InvalidFramePolicy::Disconnect,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(input), config);
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        let err = forward_frames(&mut reader, &mut writer, &Progress::new(0)).unwrap_err();

        assert!(matches!(
            err,
            RelayError::Upstream(FrameError::InvalidLength { len: 0, .. })
        ));
        assert_eq!(writer.into_inner().into_inner(), framed(b"ok"));
    }
}
