//! M3U playlist reading and writing.
//!
//! Only the narrow dialect used for UDP channel lists is understood: a
//! `#EXTINF:2,<name>` marker line, immediately followed by a transport URL
//! whose `<group>:<port>` sits after an `@`. Every marker line consumes the
//! next line as its address line; a marker with nothing after it is a
//! malformed playlist.

use std::net::Ipv4Addr;
use std::path::Path;

use crate::catalog::{Catalog, Channel};
use crate::errors::ConfigError;

pub const HEADER: &str = "#EXTM3U";
const NAME_MARKER: &str = "#EXTINF:2,";

/// Parse playlist text into channels, in file order.
pub fn parse(text: &str) -> Result<Vec<Channel>, ConfigError> {
    let mut channels = Vec::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some(name) = line.strip_prefix(NAME_MARKER) else {
            continue;
        };
        let addr_line = lines.next().ok_or_else(|| {
            ConfigError::MalformedPlaylist(format!("no address line after {line:?}"))
        })?;
        let (group, port) = parse_addr(addr_line)?;
        let name = name.trim();
        let name = (!name.is_empty()).then(|| name.to_string());
        channels.push(Channel::new(name, group, port));
    }
    Ok(channels)
}

/// Read and parse a playlist file.
pub fn load(path: &Path) -> Result<Vec<Channel>, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::PlaylistNotFound(path.display().to_string()))?;
    parse(&text)
}

/// Render the catalog in discovery order, starting with the fixed header.
pub fn render(catalog: &Catalog) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for channel in catalog.iter() {
        out.push_str(NAME_MARKER);
        out.push_str(&channel.display_name());
        out.push('\n');
        out.push_str(&channel.url());
        out.push('\n');
    }
    out
}

fn parse_addr(line: &str) -> Result<(Ipv4Addr, u16), ConfigError> {
    let malformed = || ConfigError::MalformedPlaylist(format!("bad address line {line:?}"));
    let (_, addr) = line.split_once('@').ok_or_else(malformed)?;
    let (group, port) = addr.trim().split_once(':').ok_or_else(malformed)?;
    let group = group.parse::<Ipv4Addr>().map_err(|_| malformed())?;
    let port = port.parse::<u16>().map_err(|_| malformed())?;
    Ok((group, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const SAMPLE: &str = "#EXTM3U\n\
        #EXTINF:2,ChannelA\n\
        udp://@239.1.1.1:1234\n\
        #EXTINF:2,ChannelB\n\
        udp://@239.1.1.2:1234\n";

    #[test]
    fn parses_name_address_pairs() {
        let channels = parse(SAMPLE).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name.as_deref(), Some("ChannelA"));
        assert_eq!(channels[0].group, Ipv4Addr::new(239, 1, 1, 1));
        assert_eq!(channels[0].port, 1234);
        assert_eq!(channels[1].name.as_deref(), Some("ChannelB"));
    }

    #[test]
    fn ignores_unrelated_lines() {
        let text = "#EXTM3U\n# a comment\n\n#EXTINF:2,Only\nudp://@239.9.9.9:5500\n";
        let channels = parse(text).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].port, 5500);
    }

    #[test]
    fn marker_without_address_line_is_malformed() {
        let text = "#EXTM3U\n#EXTINF:2,Dangling";
        assert!(matches!(
            parse(text),
            Err(ConfigError::MalformedPlaylist(_))
        ));
    }

    #[test]
    fn bad_address_line_is_malformed() {
        for addr in ["udp://239.1.1.1:1234", "udp://@239.1.1.1", "udp://@nope:1234"] {
            let text = format!("#EXTINF:2,X\n{addr}\n");
            assert!(parse(&text).is_err(), "accepted {addr:?}");
        }
    }

    #[test]
    fn render_starts_with_header_and_round_trips() {
        let mut catalog = Catalog::new();
        catalog.insert(Channel::new(
            Some("News1".into()),
            Ipv4Addr::new(239, 2, 0, 1),
            5000,
        ));
        catalog.insert(Channel::new(None, Ipv4Addr::new(239, 2, 0, 2), 5000));

        let text = render(&catalog);
        assert!(text.starts_with(HEADER));

        let parsed = parse(&text).unwrap();
        let rendered_keys: HashSet<_> = parsed.iter().map(Channel::key).collect();
        let original_keys: HashSet<_> = catalog.iter().map(Channel::key).collect();
        assert_eq!(rendered_keys, original_keys);

        // The unnamed entry comes back with its fallback name.
        assert_eq!(parsed[1].name.as_deref(), Some("Channel: 239.2.0.2:5000"));
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.m3u");
        assert!(matches!(
            load(&missing),
            Err(ConfigError::PlaylistNotFound(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.m3u");
        std::fs::write(&path, SAMPLE).unwrap();
        let channels = load(&path).unwrap();
        assert_eq!(channels.len(), 2);
    }
}
