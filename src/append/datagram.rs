// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::net::ToSocketAddrs;
use std::net::UdpSocket;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::Error;
use crate::append::Append;
use crate::layout::Layout;
use crate::layout::PatternLayout;
use crate::record::Record;

/// A builder to configure and create a [`DatagramAppender`].
#[derive(Debug)]
pub struct DatagramBuilder {
    name: String,
    layout: Box<dyn Layout>,
}

impl DatagramBuilder {
    /// Create a new datagram appender builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layout: Box::new(PatternLayout::default()),
        }
    }

    /// Set the layout for the datagrams.
    ///
    /// Default to [`PatternLayout`].
    pub fn layout(mut self, layout: impl Into<Box<dyn Layout>>) -> Self {
        self.layout = layout.into();
        self
    }

    /// Build the [`DatagramAppender`] targeting the given address.
    ///
    /// # Errors
    ///
    /// Return an error if the local socket cannot be bound or connected.
    pub fn build(self, target: impl ToSocketAddrs) -> Result<DatagramAppender, Error> {
        let Self { name, layout } = self;
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|err| {
            Error::new("failed to bind datagram socket").with_source(err)
        })?;
        socket.connect(target).map_err(|err| {
            Error::new("failed to connect datagram socket").with_source(err)
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|err| Error::new("failed to make datagram socket non-blocking").with_source(err))?;
        Ok(DatagramAppender {
            name,
            layout,
            socket,
            closed: AtomicBool::new(false),
        })
    }
}

/// An appender that sends each record as one UDP datagram.
///
/// The send is a single non-blocking attempt per record: a failure is
/// reported through the returned error, never retried, and never blocks the
/// logging thread waiting for delivery.
#[derive(Debug)]
pub struct DatagramAppender {
    name: String,
    layout: Box<dyn Layout>,
    socket: UdpSocket,
    closed: AtomicBool,
}

impl Append for DatagramAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, record: &Record) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::new("appender is closed").with_context("appender", &self.name));
        }
        let bytes = self.layout.format(record)?;
        self.socket.send(&bytes).map_err(|err| {
            Error::new("failed to send datagram")
                .with_context("appender", &self.name)
                .with_source(err)
        })?;
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::level::Level;

    #[test]
    fn test_send_one_datagram_per_record() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let target = receiver.local_addr().unwrap();

        let appender = DatagramBuilder::new("udp")
            .layout(PatternLayout::new("%p %m").unwrap())
            .build(target)
            .unwrap();

        appender
            .append(&Record::builder(Level::INFO, "over the wire").build())
            .unwrap();

        let mut buf = [0u8; 1024];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"INFO over the wire");
    }

    #[test]
    fn test_append_after_close_fails() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let appender = DatagramBuilder::new("udp")
            .build(receiver.local_addr().unwrap())
            .unwrap();
        appender.close().unwrap();
        assert!(
            appender
                .append(&Record::builder(Level::INFO, "late").build())
                .is_err()
        );
    }
}
