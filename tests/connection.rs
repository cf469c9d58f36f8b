// Transport tests: in-memory duplex pipes and real loopback sockets

#[cfg(test)]
mod tests {
    use module_emulator::communication::framing::MAX_FRAME_LEN;
    use module_emulator::communication::{ConnectionHandler, EmulatorServer, TransportError};
    use module_emulator::config::Config;
    use module_emulator::emulator::{build_emulator, ModuleKind};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::{timeout, Duration};

    async fn read_exact_str<R: AsyncReadExt + Unpin>(reader: &mut R, len: usize) -> String {
        let mut buf = vec![0u8; len];
        timeout(Duration::from_secs(5), reader.read_exact(&mut buf))
            .await
            .expect("timed out waiting for response")
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_thermocycler_over_duplex() {
        let (mut client, server) = tokio::io::duplex(1024);
        let emulator = build_emulator(ModuleKind::Thermocycler, &Config::default());
        let task = tokio::spawn(ConnectionHandler::new(server, emulator).run());

        client.write_all(b"M119\r\n").await.unwrap();
        let expected = "Lid:closed\r\nok\r\nok\r\n";
        assert_eq!(read_exact_str(&mut client, expected.len()).await, expected);

        // silent command: only the ack comes back
        client.write_all(b"M126\r\n").await.unwrap();
        assert_eq!(read_exact_str(&mut client, 8).await, "ok\r\nok\r\n");

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_heater_shaker_over_duplex() {
        let (mut client, server) = tokio::io::duplex(1024);
        let emulator = build_emulator(ModuleKind::HeaterShaker, &Config::default());
        let task = tokio::spawn(ConnectionHandler::new(server, emulator).run());

        client.write_all(b"M104 S55.0\n").await.unwrap();
        let expected = "M104 ok\r\nok\r\n\n";
        assert_eq!(read_exact_str(&mut client, expected.len()).await, expected);

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bad_parameter_closes_connection() {
        let (mut client, server) = tokio::io::duplex(1024);
        let emulator = build_emulator(ModuleKind::HeaterShaker, &Config::default());
        let task = tokio::spawn(ConnectionHandler::new(server, emulator).run());

        client.write_all(b"M104 SABC\n").await.unwrap();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(TransportError::Emulator(_))));

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_unterminated_flood_closes_connection() {
        let (mut client, server) = tokio::io::duplex(4096);
        let emulator = build_emulator(ModuleKind::HeaterShaker, &Config::default());
        let task = tokio::spawn(ConnectionHandler::new(server, emulator).run());

        let flood = tokio::spawn(async move {
            // the write fails once the handler hangs up
            let _ = client.write_all(&vec![b'A'; MAX_FRAME_LEN * 2]).await;
        });
        let result = timeout(Duration::from_secs(5), task).await.expect("handler did not stop").unwrap();
        match result {
            Err(TransportError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
            other => panic!("expected an I/O error, got {other:?}"),
        }
        flood.await.unwrap();
    }

    #[tokio::test]
    async fn test_scripted_exchange_with_mock_io() {
        let stream = tokio_test::io::Builder::new()
            .read(b"M104 S4\r\n\r\n")
            .write(b"ok\r\nok\r\n")
            .read(b"M105\r\n\r\n")
            .write(b"T:4 C:23\r\n\r\nok\r\nok\r\n")
            .build();
        let emulator = build_emulator(ModuleKind::TempDeck, &Config::default());
        ConnectionHandler::new(stream, emulator).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_each_tcp_connection_gets_its_own_emulator() {
        let server = EmulatorServer::new(Config::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_loop = {
            let server = server.clone();
            tokio::spawn(async move { server.serve_listener(ModuleKind::TempDeck, listener).await })
        };

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(b"M104 S40\r\n\r\nM105\r\n\r\n").await.unwrap();
        let expected = "ok\r\nok\r\nT:40 C:23\r\n\r\nok\r\nok\r\n";
        assert_eq!(read_exact_str(&mut first, expected.len()).await, expected);

        let mut second = TcpStream::connect(addr).await.unwrap();
        second.write_all(b"M105\r\n\r\n").await.unwrap();
        let expected = "T:0 C:23\r\n\r\nok\r\nok\r\n";
        assert_eq!(read_exact_str(&mut second, expected.len()).await, expected);

        accept_loop.abort();
    }
}
