//! Integration tests: client and server sessions exchanging frames over a
//! loopback TCP connection.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use h2p::hpack::encode_prefix_int;
use h2p::{CLIENT_PREFACE, Callbacks, ErrorCode, Frame, H2Error, HeaderField, Role, Session, Settings};

#[derive(Default)]
struct Collected {
    headers: Vec<(u32, Vec<HeaderField>, bool)>,
    body: Vec<u8>,
    data_starts: u32,
    ended: Vec<(u32, ErrorCode)>,
    errors: Vec<H2Error>,
}

impl Callbacks for Collected {
    fn on_headers(&mut self, stream_id: u32, headers: &[HeaderField], end_stream: bool) {
        self.headers.push((stream_id, headers.to_vec(), end_stream));
    }

    fn on_data_start(&mut self, _stream_id: u32) {
        self.data_starts += 1;
    }

    fn on_data(&mut self, _stream_id: u32, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    fn on_data_end(&mut self, stream_id: u32, code: ErrorCode) {
        self.ended.push((stream_id, code));
    }

    fn on_error(&mut self, error: &H2Error) {
        self.errors.push(error.clone());
    }
}

// -- Helpers --

fn literal_block(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (name, value) in fields {
        buf.push(0x00);
        encode_prefix_int(&mut buf, name.len() as u64, 7, 0);
        buf.extend_from_slice(name.as_bytes());
        encode_prefix_int(&mut buf, value.len() as u64, 7, 0);
        buf.extend_from_slice(value.as_bytes());
    }
    buf
}

fn response_bytes(body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    Frame::Settings {
        ack: false,
        settings: Settings::default(),
    }
    .encode(&mut buf);
    Frame::Headers {
        stream_id: 1,
        // 0x88 is the static entry `:status: 200`.
        block: [&[0x88u8][..], &literal_block(&[("server", "feed-test")])[..]].concat(),
        end_stream: false,
        end_headers: true,
        priority: None,
    }
    .encode(&mut buf);
    for chunk in body.chunks(1000) {
        Frame::Data {
            stream_id: 1,
            payload: chunk.to_vec(),
            end_stream: false,
        }
        .encode(&mut buf);
    }
    Frame::Data {
        stream_id: 1,
        payload: Vec::new(),
        end_stream: true,
    }
    .encode(&mut buf);
    buf
}

fn decode_all(bytes: &[u8], chunk: usize) -> Collected {
    let mut session = Session::new(Role::Client, Collected::default());
    for piece in bytes.chunks(chunk) {
        session.feed(1, piece).unwrap();
    }
    session.into_callbacks()
}

// -- Tests --

#[test]
fn chunking_does_not_change_events() {
    let body: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let bytes = response_bytes(&body);

    let whole = decode_all(&bytes, bytes.len());
    let bytewise = decode_all(&bytes, 1);
    let odd = decode_all(&bytes, 7);

    for collected in [&whole, &bytewise, &odd] {
        assert_eq!(collected.body, body);
        assert_eq!(collected.data_starts, 1);
        assert_eq!(collected.ended, vec![(1, ErrorCode::NoError)]);
        assert!(collected.errors.is_empty());
        assert_eq!(
            collected.headers[0].1,
            vec![
                HeaderField::new(":status", "200"),
                HeaderField::new("server", "feed-test"),
            ]
        );
    }
}

#[test]
fn loopback_request_and_response() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        let mut session = Session::new(Role::Server, Collected::default());
        let mut buf = [0u8; 512];
        while session.callbacks().headers.is_empty() {
            let n = sock.read(&mut buf).unwrap();
            assert!(n > 0, "client closed before sending a request");
            session.feed(0, &buf[..n]).unwrap();
        }

        // SETTINGS ACK queued for the client's SETTINGS, then the response.
        let mut out = session.take_pending_send();
        out.extend(response_bytes(b"pong"));
        sock.write_all(&out).unwrap();
        session.into_callbacks()
    });

    let mut sock = TcpStream::connect(addr).unwrap();
    let mut request = CLIENT_PREFACE.to_vec();
    Frame::Settings {
        ack: false,
        settings: Settings::default(),
    }
    .encode(&mut request);
    Frame::Headers {
        stream_id: 1,
        block: literal_block(&[(":method", "GET"), (":path", "/ping")]),
        end_stream: true,
        end_headers: true,
        priority: None,
    }
    .encode(&mut request);
    sock.write_all(&request).unwrap();

    let seen_by_server = server.join().unwrap();
    assert_eq!(seen_by_server.headers.len(), 1);
    let (stream_id, fields, end_stream) = &seen_by_server.headers[0];
    assert_eq!(*stream_id, 1);
    assert!(*end_stream);
    assert_eq!(fields[1], HeaderField::new(":path", "/ping"));

    let mut client = Session::new(Role::Client, Collected::default());
    let mut buf = [0u8; 512];
    loop {
        let n = sock.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        client.feed(1, &buf[..n]).unwrap();
    }
    let collected = client.into_callbacks();
    assert_eq!(collected.body, b"pong");
    assert_eq!(collected.ended, vec![(1, ErrorCode::NoError)]);
}
