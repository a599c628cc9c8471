//! Integration tests: the full client against a scripted RTSP server on a
//! loopback socket.
//!
//! Each test starts a server thread that accepts one control connection,
//! frames incoming requests, and answers them through a per-test script.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtsp::protocol::{Frame, Method, MessageFramer, RtspMessage, RtspRequest, RtspResponse};
use rtsp::session::TransportHeader;
use rtsp::{Client, ClientConfig, Closure, RtpPacket, RtspError, SessionState, TransportMode};

const SDP: &str = "v=0\r\n\
                   o=- 0 0 IN IP4 127.0.0.1\r\n\
                   s=Stream\r\n\
                   a=control:*\r\n\
                   m=video 0 RTP/AVP 96\r\n\
                   a=rtpmap:96 H264/90000\r\n\
                   a=control:track1\r\n";

/// Everything the scripted server received.
#[derive(Default)]
struct Transcript {
    requests: Vec<RtspRequest>,
    acks: Vec<RtspResponse>,
}

impl Transcript {
    fn methods(&self) -> Vec<Method> {
        self.requests.iter().map(|r| r.method).collect()
    }
}

/// Accept one connection and answer every request with `script` until
/// TEARDOWN has been answered or the client goes away.
fn serve<F>(mut script: F) -> (SocketAddr, JoinHandle<Transcript>)
where
    F: FnMut(&RtspRequest, &mut TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        let mut framer = MessageFramer::new();
        let mut transcript = Transcript::default();
        let mut buf = [0u8; 4096];

        loop {
            let n = match sock.read(&mut buf) {
                Ok(0) | Err(_) => return transcript,
                Ok(n) => n,
            };
            framer.extend(&buf[..n]);
            while let Ok(Some(frame)) = framer.next_frame() {
                let Frame::Message(raw) = frame else { continue };
                match RtspMessage::parse(&raw).unwrap() {
                    RtspMessage::Request(request) => {
                        script(&request, &mut sock);
                        let done = request.method == Method::Teardown;
                        transcript.requests.push(request);
                        if done {
                            return transcript;
                        }
                    }
                    RtspMessage::Response(ack) => transcript.acks.push(ack),
                }
            }
        }
    });
    (addr, handle)
}

fn respond(
    sock: &mut TcpStream,
    request: &RtspRequest,
    status: &str,
    headers: &[(&str, &str)],
    body: &str,
) {
    let mut out = format!("RTSP/1.0 {status}\r\nCSeq: {}\r\n", request.cseq().unwrap());
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    if !body.is_empty() {
        out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    out.push_str("\r\n");
    out.push_str(body);
    sock.write_all(out.as_bytes()).unwrap();
}

/// A well-behaved server: SDP with one track, session 4321.
fn standard_reply(request: &RtspRequest, sock: &mut TcpStream) {
    match request.method {
        Method::Describe => {
            let base = format!("{}/", request.uri);
            respond(
                sock,
                request,
                "200 OK",
                &[("Content-Type", "application/sdp"), ("Content-Base", base.as_str())],
                SDP,
            );
        }
        Method::Setup => {
            let transport = format!(
                "{};server_port=5000-5001",
                request.get_header("Transport").unwrap()
            );
            respond(
                sock,
                request,
                "200 OK",
                &[("Session", "4321;timeout=60"), ("Transport", transport.as_str())],
                "",
            );
        }
        _ => respond(sock, request, "200 OK", &[("Session", "4321")], ""),
    }
}

fn notice(sock: &mut TcpStream, code: &str) {
    let msg = format!(
        "ANNOUNCE rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 1\r\nSession: 4321\r\n\
         x-notice: {code}\r\n\r\n"
    );
    sock.write_all(msg.as_bytes()).unwrap();
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("rtsp://{addr}{path}")
}

fn wait_for_state(client: &Client, state: SessionState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while client.state() != state {
        assert!(Instant::now() < deadline, "state stuck at {:?}", client.state());
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn start_chains_requests_and_receives_udp_media() {
    let mut rtp_port = None;
    let (addr, server) = serve(move |request, sock| {
        standard_reply(request, sock);
        match request.method {
            Method::Setup => {
                let th = TransportHeader::parse(request.get_header("Transport").unwrap()).unwrap();
                rtp_port = th.client_ports.map(|(rtp, _)| rtp);
            }
            Method::Play => {
                let media = UdpSocket::bind("127.0.0.1:0").unwrap();
                let dest = ("127.0.0.1", rtp_port.unwrap());
                for seq in [1u16, 2, 4, 3, 5] {
                    let packet =
                        RtpPacket::new(96, seq, u32::from(seq) * 3000, 0xCAFE, vec![seq as u8; 8]);
                    media.send_to(&packet.encode(), dest).unwrap();
                }
            }
            _ => {}
        }
    });

    let mut client = Client::connect(&url(addr, "/stream"), ClientConfig::default()).unwrap();
    let frames = client.take_frames().unwrap();
    client.start().unwrap();
    assert_eq!(client.state(), SessionState::Playing);
    assert_eq!(client.session_id().as_deref(), Some("4321"));
    assert_eq!(client.transport().unwrap().server_ports, Some((5000, 5001)));

    let mut seqs = Vec::new();
    while seqs.last() != Some(&5) {
        let frame = frames.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.ssrc, 0xCAFE);
        seqs.push(frame.sequence);
    }
    assert_eq!(seqs, vec![1, 2, 4, 5]);

    let report = client.teardown().unwrap();
    assert_eq!(report.state, SessionState::Closed);
    assert_eq!(report.closure, Some(Closure::TornDown));
    assert_eq!(report.stats.delivered, 4);
    assert_eq!(report.stats.lost, 1);
    assert_eq!(report.stats.late, 1);
    drop(client);

    let transcript = server.join().unwrap();
    assert_eq!(
        transcript.methods(),
        vec![Method::Describe, Method::Setup, Method::Play, Method::Teardown]
    );
    let cseqs: Vec<u32> = transcript.requests.iter().map(|r| r.cseq().unwrap()).collect();
    assert_eq!(cseqs, vec![1, 2, 3, 4]);

    let setup = &transcript.requests[1];
    assert!(setup.uri.ends_with("/stream/track1"));
    assert!(setup.get_header("Session").is_none());
    for request in &transcript.requests[2..] {
        assert_eq!(request.get_header("Session"), Some("4321"));
        assert!(request.get_header("User-Agent").is_some());
    }
    assert_eq!(transcript.requests[2].get_header("Range"), Some("npt=0.000-"));
}

#[test]
fn not_found_closes_session() {
    let (addr, server) = serve(|request, sock| respond(sock, request, "404 Not Found", &[], ""));

    let mut client = Client::connect(&url(addr, "/missing"), ClientConfig::default()).unwrap();
    let err = client.describe().unwrap_err();
    assert!(matches!(
        err,
        RtspError::SessionRejected {
            method: Method::Describe,
            status: 404,
            ..
        }
    ));
    assert_eq!(client.state(), SessionState::Closed);
    assert!(matches!(client.play(), Err(RtspError::SessionClosed)));

    let report = client.teardown().unwrap();
    assert_eq!(report.state, SessionState::Closed);
    drop(client);

    assert_eq!(server.join().unwrap().methods(), vec![Method::Describe]);
}

#[test]
fn redirect_reconnects_to_location() {
    let (target, moved) = serve(standard_reply);
    let location = url(target, "/moved");
    let (addr, origin) = serve(move |request, sock| {
        respond(
            sock,
            request,
            "302 Moved Temporarily",
            &[("Location", location.as_str())],
            "",
        );
    });

    let mut client = Client::connect(&url(addr, "/stream"), ClientConfig::default()).unwrap();
    match client.start() {
        Err(RtspError::RedirectRequested { location }) => assert!(location.ends_with("/moved")),
        other => panic!("expected redirect, got {other:?}"),
    }
    assert_eq!(client.state(), SessionState::Closed);

    let mut client = client.follow_redirect().unwrap();
    assert_eq!(client.state(), SessionState::Playing);
    assert_eq!(client.url().path, "/moved");
    client.teardown().unwrap();
    drop(client);

    assert_eq!(origin.join().unwrap().methods(), vec![Method::Describe]);
    assert_eq!(
        moved.join().unwrap().methods(),
        vec![Method::Describe, Method::Setup, Method::Play, Method::Teardown]
    );
}

#[test]
fn end_of_stream_notice_resumes_playback() {
    let (resumed_tx, resumed) = mpsc::channel();
    let mut plays = 0;
    let (addr, server) = serve(move |request, sock| {
        standard_reply(request, sock);
        if request.method == Method::Play {
            plays += 1;
            if plays == 1 {
                notice(sock, "2101 \"End of Stream Reached\"");
            } else {
                resumed_tx.send(request.clone()).unwrap();
            }
        }
    });

    let mut client = Client::connect(&url(addr, "/stream"), ClientConfig::default()).unwrap();
    client.start().unwrap();

    let resumed_play = resumed.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(resumed_play.get_header("Scale"), Some("1"));
    assert_eq!(resumed_play.get_header("Session"), Some("4321"));

    client.teardown().unwrap();
    drop(client);

    let transcript = server.join().unwrap();
    assert_eq!(
        transcript.methods(),
        vec![Method::Describe, Method::Setup, Method::Play, Method::Play, Method::Teardown]
    );
    assert_eq!(transcript.acks.len(), 1);
    assert_eq!(transcript.acks[0].status_code, 200);
    assert_eq!(transcript.acks[0].cseq(), Some(1));
}

#[test]
fn close_notice_tears_down() {
    let (addr, server) = serve(|request, sock| {
        standard_reply(request, sock);
        if request.method == Method::GetParameter {
            notice(sock, "2103 \"Close\"");
        }
    });

    let mut client = Client::connect(&url(addr, "/stream"), ClientConfig::default()).unwrap();
    client.start().unwrap();
    client.get_parameter().unwrap();
    wait_for_state(&client, SessionState::Closed);

    let report = client.teardown().unwrap();
    assert_eq!(report.closure, Some(Closure::TornDown));
    drop(client);

    assert_eq!(
        server.join().unwrap().methods(),
        vec![
            Method::Describe,
            Method::Setup,
            Method::Play,
            Method::GetParameter,
            Method::Teardown
        ]
    );
}

#[test]
fn interleaved_media_arrives_on_control_connection() {
    let (addr, server) = serve(|request, sock| {
        standard_reply(request, sock);
        if request.method == Method::Play {
            let mut out = Vec::new();
            for (channel, seq) in [(0u8, 7u16), (1, 0), (0, 8)] {
                let packet = RtpPacket::new(96, seq, 0, 1, b"nal".to_vec()).encode();
                out.push(b'$');
                out.push(channel);
                out.extend_from_slice(&(packet.len() as u16).to_be_bytes());
                out.extend_from_slice(&packet);
            }
            sock.write_all(&out).unwrap();
        }
    });

    let config = ClientConfig {
        transport: TransportMode::Interleaved,
        ..ClientConfig::default()
    };
    let mut client = Client::connect(&url(addr, "/stream"), config).unwrap();
    let frames = client.take_frames().unwrap();
    client.start().unwrap();
    assert_eq!(client.transport().unwrap().interleaved, Some((0, 1)));
    assert_eq!(client.rtp_port(), None);

    let first = frames.recv_timeout(Duration::from_secs(5)).unwrap();
    let second = frames.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!((first.sequence, second.sequence), (7, 8));
    assert_eq!(second.payload, b"nal");
    assert!(second.index > first.index);

    client.teardown().unwrap();
    drop(client);

    let transcript = server.join().unwrap();
    assert_eq!(
        transcript.requests[1].get_header("Transport"),
        Some("RTP/AVP/TCP;unicast;interleaved=0-1")
    );
}

#[test]
fn media_silence_while_playing_closes_session() {
    let (addr, server) = serve(standard_reply);

    let config = ClientConfig {
        media_timeout: Duration::from_millis(300),
        poll_interval: Duration::from_millis(50),
        ..ClientConfig::default()
    };
    let mut client = Client::connect(&url(addr, "/stream"), config).unwrap();
    client.start().unwrap();
    wait_for_state(&client, SessionState::Closed);
    assert!(matches!(client.closure(), Some(Closure::MediaFailed(_))));

    let err = client.teardown().unwrap_err();
    assert!(matches!(err, RtspError::Timeout { .. }), "got {err:?}");
    assert_eq!(client.state(), SessionState::Closed);
    drop(client);

    assert_eq!(
        server.join().unwrap().methods(),
        vec![Method::Describe, Method::Setup, Method::Play, Method::Teardown]
    );
}

#[test]
fn stray_control_traffic_is_dropped() {
    let (addr, server) = serve(|request, sock| {
        match request.method {
            Method::Play => {
                standard_reply(request, sock);
                sock.write_all(b"\x01\x02 not rtsp\r\n\r\n").unwrap();
                sock.write_all(b"RTSP/1.0 200 OK\r\nCSeq: 999\r\nSession: 4321\r\n\r\n")
                    .unwrap();
            }
            Method::GetParameter => {
                respond(sock, request, "200 OK", &[("Session", "9999")], "");
                standard_reply(request, sock);
            }
            _ => standard_reply(request, sock),
        }
    });

    let mut client = Client::connect(&url(addr, "/stream"), ClientConfig::default()).unwrap();
    client.start().unwrap();

    let reply = client.get_parameter().unwrap();
    assert_eq!(reply.session_id(), Some("4321"));
    assert_eq!(client.state(), SessionState::Playing);
    assert_eq!(client.closure(), None);

    client.teardown().unwrap();
    drop(client);

    assert_eq!(
        server.join().unwrap().methods(),
        vec![
            Method::Describe,
            Method::Setup,
            Method::Play,
            Method::GetParameter,
            Method::Teardown
        ]
    );
}

#[test]
fn keepalive_sent_while_idle() {
    let (keepalive_tx, keepalive) = mpsc::channel();
    let (addr, server) = serve(move |request, sock| {
        standard_reply(request, sock);
        if request.method == Method::GetParameter {
            let _ = keepalive_tx.send(request.clone());
        }
    });

    let config = ClientConfig {
        keepalive_interval: Duration::from_millis(300),
        poll_interval: Duration::from_millis(50),
        ..ClientConfig::default()
    };
    let mut client = Client::connect(&url(addr, "/stream"), config).unwrap();
    client.start().unwrap();

    let request = keepalive.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(request.get_header("Session"), Some("4321"));
    assert!(request.body.is_empty());
    assert_eq!(client.state(), SessionState::Playing);

    client.teardown().unwrap();
    drop(client);
    server.join().unwrap();
}

#[test]
fn step_by_step_with_commands() {
    let (addr, server) = serve(standard_reply);

    let mut client = Client::connect(&url(addr, "/live.sdp"), ClientConfig::default()).unwrap();
    assert!(matches!(
        client.play(),
        Err(RtspError::InvalidState {
            method: Method::Play,
            state: SessionState::Init
        })
    ));

    client.options().unwrap();
    let sdp = client.describe().unwrap();
    assert!(sdp.contains("a=control:track1"));
    assert_eq!(client.state(), SessionState::Init);

    client.setup(None).unwrap();
    assert_eq!(client.state(), SessionState::Ready);
    assert!(client.rtp_port().unwrap() % 2 == 0);

    client.play().unwrap();
    assert_eq!(client.state(), SessionState::Playing);
    client.command(rtsp::PlaybackCommand::Pause).unwrap();
    assert_eq!(client.state(), SessionState::Ready);
    client.command(rtsp::PlaybackCommand::Forward).unwrap();
    assert_eq!(client.state(), SessionState::Playing);
    client.command(rtsp::PlaybackCommand::Teardown).unwrap();
    assert_eq!(client.state(), SessionState::Closed);
    drop(client);

    let transcript = server.join().unwrap();
    assert_eq!(
        transcript.methods(),
        vec![
            Method::Options,
            Method::Describe,
            Method::Setup,
            Method::Play,
            Method::Pause,
            Method::Play,
            Method::Teardown
        ]
    );
    assert_eq!(transcript.requests[3].get_header("Range"), Some("npt=end-"));
    assert_eq!(transcript.requests[5].get_header("Range"), Some("npt=now-"));
    assert_eq!(transcript.requests[5].get_header("Scale"), Some("2"));
}
