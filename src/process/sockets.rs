//! Socket ownership and port resolution.
//!
//! Ports are resolved the way `ss`/`netstat` do it: socket inodes are read
//! from the `fd/` links of a process and joined against the TCP and UDP
//! tables of its network namespace (`net/tcp`, `net/tcp6`, `net/udp`,
//! `net/udp6`). Unix and raw sockets never appear in those tables and are
//! therefore excluded.

use ahash::AHashMap as HashMap;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use tracing::debug;

/// Transport of a socket table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Stream sockets.
    Tcp,
    /// Datagram sockets.
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
            Transport::Udp => write!(f, "udp"),
        }
    }
}

/// One row of a `/proc/net/{tcp,udp}[6]` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    pub transport: Transport,
    pub local: SocketAddr,
    pub remote: SocketAddr,
    pub inode: u64,
}

impl fmt::Display for SocketEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.transport, self.local, self.remote)
    }
}

const TABLES: [(&str, Transport); 4] = [
    ("tcp", Transport::Tcp),
    ("tcp6", Transport::Tcp),
    ("udp", Transport::Udp),
    ("udp6", Transport::Udp),
];

/// Inode-indexed view over the TCP/UDP tables of one network namespace.
#[derive(Debug, Default)]
pub struct SocketTable {
    entries: HashMap<u64, SocketEntry>,
}

impl SocketTable {
    /// Loads all four tables from `net_dir`.
    ///
    /// Individual tables may be missing (no IPv6, for example); only a
    /// directory where none of them can be read is an error.
    pub fn load(net_dir: &Path) -> Result<Self, std::io::Error> {
        let mut table = SocketTable::default();
        let mut any_read = false;

        for (file, transport) in TABLES {
            match fs::read_to_string(net_dir.join(file)) {
                Ok(content) => {
                    any_read = true;
                    table.extend(parse_net_table(&content, transport));
                }
                Err(e) => {
                    debug!("Skipping {}/{}: {}", net_dir.display(), file, e);
                }
            }
        }

        if !any_read {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no socket tables readable under {}", net_dir.display()),
            ));
        }
        Ok(table)
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = SocketEntry>) {
        for entry in entries {
            self.entries.insert(entry.inode, entry);
        }
    }

    pub fn get(&self, inode: u64) -> Option<&SocketEntry> {
        self.entries.get(&inode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses the body of one socket table. Header and malformed lines are skipped.
pub fn parse_net_table(content: &str, transport: Transport) -> Vec<SocketEntry> {
    let mut out = Vec::new();

    for line in content.lines().skip(1) {
        // sl local_address rem_address st tx:rx tr:tm retrnsmt uid timeout inode
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }

        let (local, remote) = match (parse_hex_addr(fields[1]), parse_hex_addr(fields[2])) {
            (Some(l), Some(r)) => (l, r),
            _ => continue,
        };
        let inode: u64 = match fields[9].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        // TIME_WAIT and similar orphaned rows carry inode 0 and belong to nobody.
        if inode == 0 {
            continue;
        }

        out.push(SocketEntry {
            transport,
            local,
            remote,
            inode,
        });
    }

    out
}

/// Decodes `ADDR:PORT` where ADDR is the kernel's hex dump of the address
/// in host byte order (8 digits for IPv4, 32 for IPv6).
pub fn parse_hex_addr(s: &str) -> Option<SocketAddr> {
    let (addr_hex, port_hex) = s.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;

    let ip = match addr_hex.len() {
        8 => {
            let word = u32::from_str_radix(addr_hex, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes()))
        }
        32 => {
            let mut bytes = [0u8; 16];
            for (i, chunk) in bytes.chunks_mut(4).enumerate() {
                let word = u32::from_str_radix(&addr_hex[i * 8..i * 8 + 8], 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(bytes))
        }
        _ => return None,
    };

    Some(SocketAddr::new(ip, port))
}

/// Extracts the inode from an fd link target such as `socket:[12345]`.
pub fn parse_socket_link(target: &str) -> Option<u64> {
    target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Socket inodes owned by the process at `proc_path`.
///
/// An unreadable `fd/` directory (exited process, foreign user) yields an
/// empty list.
pub fn socket_inodes(proc_path: &Path) -> Vec<u64> {
    let mut inodes = Vec::new();
    let entries = match fs::read_dir(proc_path.join("fd")) {
        Ok(e) => e,
        Err(e) => {
            debug!("Cannot list {}/fd: {}", proc_path.display(), e);
            return inodes;
        }
    };

    for entry in entries.flatten() {
        if let Ok(target) = fs::read_link(entry.path()) {
            if let Some(inode) = target.to_str().and_then(parse_socket_link) {
                inodes.push(inode);
            }
        }
    }
    inodes
}

/// Ports and socket descriptions of one process.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessSockets {
    pub ports: Vec<u32>,
    pub sockets: Vec<String>,
}

/// Joins the inodes owned by a process against `table`.
///
/// The local port is recorded when nonzero, likewise the remote port; the
/// result is deduplicated and ascending.
pub fn resolve_sockets(inodes: &[u64], table: &SocketTable) -> ProcessSockets {
    let mut ports = BTreeSet::new();
    let mut sockets = Vec::new();

    for inode in inodes {
        let Some(entry) = table.get(*inode) else {
            continue;
        };
        if entry.local.port() != 0 {
            ports.insert(u32::from(entry.local.port()));
        }
        if entry.remote.port() != 0 {
            ports.insert(u32::from(entry.remote.port()));
        }
        sockets.push(entry.to_string());
    }

    ProcessSockets {
        ports: ports.into_iter().collect(),
        sockets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TCP_TABLE: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 1001 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1F90 0100007F:C350 01 00000000:00000000 00:00000000 00000000     0        0 1002 1 0000000000000000 20 4 30 10 -1
   2: 0100007F:9C40 0100007F:1F90 06 00000000:00000000 03:00001770 00000000     0        0 0 3 0000000000000000
";

    const UDP6_TABLE: &str = "  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode ref pointer drops
  0: 00000000000000000000000000000000:0035 00000000000000000000000000000000:0000 07 00000000:00000000 00:00000000 00000000   101        0 2001 2 0000000000000000 0
";

    #[test]
    fn test_parse_hex_addr_ipv4() {
        let addr = parse_hex_addr("0100007F:1F90").expect("valid address");
        assert_eq!(addr.port(), 8080);
        if cfg!(target_endian = "little") {
            assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
    }

    #[test]
    fn test_parse_hex_addr_ipv6_unspecified() {
        let addr = parse_hex_addr("00000000000000000000000000000000:0035").expect("valid");
        assert_eq!(addr.port(), 53);
        assert_eq!(addr.ip(), IpAddr::V6(Ipv6Addr::UNSPECIFIED));
    }

    #[test]
    fn test_parse_hex_addr_invalid() {
        assert!(parse_hex_addr("nothex:0050").is_none());
        assert!(parse_hex_addr("0100007F").is_none());
        assert!(parse_hex_addr("0100:0050").is_none());
    }

    #[test]
    fn test_parse_net_table_skips_header_and_orphans() {
        let entries = parse_net_table(TCP_TABLE, Transport::Tcp);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].inode, 1001);
        assert_eq!(entries[0].local.port(), 8080);
        assert_eq!(entries[0].remote.port(), 0);
        assert_eq!(entries[1].remote.port(), 50000);
    }

    #[test]
    fn test_parse_socket_link() {
        assert_eq!(parse_socket_link("socket:[12345]"), Some(12345));
        assert_eq!(parse_socket_link("pipe:[12345]"), None);
        assert_eq!(parse_socket_link("/dev/null"), None);
        assert_eq!(parse_socket_link("socket:[abc]"), None);
    }

    #[test]
    fn test_resolve_sockets_dedups_and_skips_zero_ports() {
        let mut table = SocketTable::default();
        table.extend(parse_net_table(TCP_TABLE, Transport::Tcp));
        table.extend(parse_net_table(UDP6_TABLE, Transport::Udp));

        // 9999 is not a network socket (unix socket inode, for example)
        let resolved = resolve_sockets(&[1001, 1002, 2001, 9999], &table);
        assert_eq!(resolved.ports, vec![53, 8080, 50000]);
        assert_eq!(resolved.sockets.len(), 3);
        assert!(resolved.sockets[2].starts_with("udp "));
    }

    #[test]
    fn test_socket_table_load_partial_directory() {
        let dir = tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("tcp"), TCP_TABLE).expect("write tcp");

        let table = SocketTable::load(dir.path()).expect("tcp table is enough");
        assert_eq!(table.len(), 2);
        assert!(table.get(1002).is_some());
    }

    #[test]
    fn test_socket_table_load_empty_directory() {
        let dir = tempdir().expect("Failed to create temp dir");
        assert!(SocketTable::load(dir.path()).is_err());
    }

    #[test]
    fn test_socket_inodes_reads_fd_links() {
        let dir = tempdir().expect("Failed to create temp dir");
        let fd = dir.path().join("fd");
        std::fs::create_dir(&fd).expect("create fd dir");
        std::os::unix::fs::symlink("socket:[1001]", fd.join("3")).expect("symlink");
        std::os::unix::fs::symlink("/dev/null", fd.join("0")).expect("symlink");
        std::os::unix::fs::symlink("pipe:[77]", fd.join("4")).expect("symlink");

        assert_eq!(socket_inodes(dir.path()), vec![1001]);
    }
}
