//! Tests for the transport layer
//!
//! These tests drive `TcpTransport` against an in-process peer and check the
//! codec on the documents the daemon actually sends.

#[cfg(test)]
mod tests {
    use crate::protocol::{command_payload, wrap_request, StructuredValue};
    use crate::transport::{TcpTransport, XmlCodec, TERMINATOR};
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

    /// Reads one terminated frame from the client side of a test connection.
    fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
        let mut frame = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            stream.read_exact(&mut byte).unwrap();
            if byte[0] == TERMINATOR {
                return frame;
            }
            frame.push(byte[0]);
        }
    }

    /// Echo peer that sends every frame back in the given pieces.
    fn spawn_echo_peer(pieces: usize) -> (u16, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.set_nodelay(true).unwrap();

            let mut reply = read_frame(&mut stream);
            reply.push(TERMINATOR);

            let piece_len = reply.len().div_ceil(pieces).max(1);
            for piece in reply.chunks(piece_len) {
                stream.write_all(piece).unwrap();
                stream.flush().unwrap();
                thread::sleep(Duration::from_millis(20));
            }
        });

        (port, handle)
    }

    #[test]
    fn test_echo_single_chunk() {
        let (port, peer) = spawn_echo_peer(1);
        let mut transport = TcpTransport::open("127.0.0.1", port, TIMEOUT).unwrap();

        let reply = transport.call(b"some_data").unwrap();
        assert_eq!(reply, b"some_data");
        peer.join().unwrap();
    }

    #[test]
    fn test_echo_multi_chunk() {
        let (port, peer) = spawn_echo_peer(3);
        let mut transport = TcpTransport::open("127.0.0.1", port, TIMEOUT).unwrap();

        let reply = transport.call(b"<get_host_info/><more>text</more>").unwrap();
        assert_eq!(reply, b"<get_host_info/><more>text</more>");
        peer.join().unwrap();
    }

    #[test]
    fn test_echo_returns_sanitized_message() {
        let (port, peer) = spawn_echo_peer(2);
        let mut transport = TcpTransport::open("127.0.0.1", port, TIMEOUT).unwrap();

        let reply = transport.call(b"<ssddff   />").unwrap();
        assert_eq!(reply, b"<ssddff/>");
        peer.join().unwrap();
    }

    #[test]
    fn test_large_message_spans_many_reads() {
        let (port, peer) = spawn_echo_peer(1);
        let mut transport = TcpTransport::open("127.0.0.1", port, TIMEOUT).unwrap();

        let body = "x".repeat(50_000);
        let message = format!("<a>{}</a>", body);
        let reply = transport.call(message.as_bytes()).unwrap();
        assert_eq!(reply, message.as_bytes());
        peer.join().unwrap();
    }

    #[test]
    fn test_drop_closes_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let transport = TcpTransport::open("127.0.0.1", port, TIMEOUT).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();
        drop(transport);

        let mut buf = [0u8; 1];
        assert_eq!(server_side.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_disconnect_then_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut transport = TcpTransport::open("127.0.0.1", port, TIMEOUT).unwrap();
        transport.disconnect();
        assert!(!transport.is_connected());

        transport.connect().unwrap();
        assert!(transport.is_connected());
    }

    #[test]
    fn test_request_document_on_the_wire() {
        let request = XmlCodec::encode(&wrap_request(command_payload("exchange_versions"))).unwrap();
        assert_eq!(
            request,
            "<boinc_gui_rpc_request><exchange_versions/></boinc_gui_rpc_request>"
        );
    }

    #[test]
    fn test_decode_server_version_reply() {
        let reply = b"<boinc_gui_rpc_reply>\n<server_version>\n   <major>7</major>\n   <minor>8</minor>\n   <release>4</release>\n</server_version>\n</boinc_gui_rpc_reply>\n";
        let decoded = XmlCodec::decode(reply).unwrap();

        let version = decoded
            .get("boinc_gui_rpc_reply")
            .and_then(|r| r.get("server_version"))
            .unwrap();
        let fields: Vec<_> = version
            .as_mapping()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str().unwrap()))
            .collect();
        assert_eq!(fields, vec![("major", "7"), ("minor", "8"), ("release", "4")]);
    }

    #[test]
    fn test_decode_repeated_results() {
        let reply = "<boinc_gui_rpc_reply><results>\
            <result><name>wu_1</name></result>\
            <result><name>wu_2</name></result>\
            <result><name>wu_3</name></result>\
            </results></boinc_gui_rpc_reply>";
        let decoded = XmlCodec::decode_str(reply).unwrap();

        let results = decoded
            .get("boinc_gui_rpc_reply")
            .and_then(|r| r.get("results"))
            .and_then(|r| r.get("result"))
            .and_then(StructuredValue::as_sequence)
            .unwrap();
        let names: Vec<_> = results
            .iter()
            .filter_map(|r| r.get("name").and_then(StructuredValue::as_str))
            .collect();
        assert_eq!(names, vec!["wu_1", "wu_2", "wu_3"]);
    }
}
