//! Recover the installed package name from a reference.
//!
//! Registry references carry the name in the string itself. Tarballs have
//! to be unpacked to read their manifest; if that fails the name is
//! inferred from the archive's file name instead.

use crate::manifest::{MANIFEST_FILE, ManifestError, PackageJson};
use crate::progress::Progress;
use crate::reference::{PackageReference, absolutize, is_tarball_name};
use crate::workspace::TempWorkspace;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tar::Archive;
use tokio::io::AsyncWriteExt;

/// File a remote archive is streamed into inside the workspace
const DOWNLOAD_FILE: &str = "download.tgz";
/// Directory an archive is unpacked into inside the workspace
const UNPACK_DIR: &str = "unpacked";

/// Where the bytes of a tarball come from
enum TarballSource<'a> {
    Remote(&'a str),
    Local(PathBuf),
}

/// Determines the name a reference installs under
pub struct NameExtractor {
    original_cwd: PathBuf,
    client: reqwest::Client,
}

impl NameExtractor {
    /// `original_cwd` anchors relative tarball paths
    pub fn new(original_cwd: &Path) -> Self {
        Self {
            original_cwd: original_cwd.to_path_buf(),
            client: reqwest::Client::new(),
        }
    }

    /// Name of the package `reference` will install.
    ///
    /// Tarball inspection failures are recovered by inference and never
    /// returned; a `file:` directory whose manifest cannot be read is.
    pub async fn extract(
        &self,
        reference: &PackageReference,
        progress: &mut Progress,
    ) -> Result<String, ExtractError> {
        match reference {
            PackageReference::TarballUrl(url) => {
                progress.start_fetch(url);
                let inspected = self.name_from_tarball(TarballSource::Remote(url)).await;
                progress.finish_fetch();
                recover_tarball_name(inspected, url, progress)
            }
            PackageReference::TarballPath(raw) => {
                let path = absolutize(&self.original_cwd, Path::new(raw));
                let inspected = self.name_from_tarball(TarballSource::Local(path)).await;
                recover_tarball_name(inspected, raw, progress)
            }
            // `file:` may point at an archive as well as a directory
            PackageReference::LocalPath(path) if is_tarball_name(&path.to_string_lossy()) => {
                let raw = path.to_string_lossy().into_owned();
                let inspected = self
                    .name_from_tarball(TarballSource::Local(path.clone()))
                    .await;
                recover_tarball_name(inspected, &raw, progress)
            }
            PackageReference::GitUrl(raw) => Ok(name_from_git_url(raw)),
            PackageReference::LocalPath(dir) => {
                let pkg = PackageJson::read_from_dir(dir).await?;
                Ok(pkg.require_name(dir)?)
            }
            PackageReference::RegistryDefault { name } => Ok(name.clone()),
            PackageReference::RegistryVersioned { .. }
            | PackageReference::RegistryTagged { .. }
            | PackageReference::ScopedTagged { .. }
            | PackageReference::RawPassthrough(_) => {
                Ok(strip_qualifier(&reference.as_install_arg()).to_string())
            }
        }
    }

    async fn name_from_tarball(&self, source: TarballSource<'_>) -> Result<String, ExtractError> {
        let mut workspace = TempWorkspace::acquire()
            .await
            .map_err(|e| ExtractError::Io(e.to_string()))?;
        let root = workspace.path().to_path_buf();

        let result = async {
            let tarball = match source {
                TarballSource::Remote(url) => {
                    let file = root.join(DOWNLOAD_FILE);
                    self.download(url, &file).await?;
                    file
                }
                TarballSource::Local(path) => path,
            };

            let dest = root.join(UNPACK_DIR);
            let unpack_dest = dest.clone();
            tokio::task::spawn_blocking(move || unpack_tarball(&tarball, &unpack_dest))
                .await
                .map_err(|e| ExtractError::Io(e.to_string()))??;

            let package_dir = find_package_root(&dest)?;
            let pkg = PackageJson::read_from_dir(&package_dir).await?;
            Ok::<_, ExtractError>(pkg.require_name(&package_dir)?)
        }
        .await;

        workspace.release();
        result
    }

    /// Stream the response body for `url` into `dest`
    async fn download(&self, url: &str, dest: &Path) -> Result<(), ExtractError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtractError::Http(response.status().as_u16()));
        }

        let io_err = |e: std::io::Error| ExtractError::Io(format!("{}: {}", dest.display(), e));
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ExtractError::Network(e.to_string()))?
        {
            file.write_all(&chunk).await.map_err(io_err)?;
        }
        file.flush().await.map_err(io_err)?;
        Ok(())
    }
}

/// Fall back to the archive's file name when inspection failed
fn recover_tarball_name(
    inspected: Result<String, ExtractError>,
    raw: &str,
    progress: &Progress,
) -> Result<String, ExtractError> {
    let e = match inspected {
        Ok(name) => return Ok(name),
        Err(e) => e,
    };
    tracing::debug!(reference = %raw, error = %e, "tarball inspection failed");
    let name = infer_from_tarball_name(raw)
        .ok_or_else(|| ExtractError::NotInferable(raw.to_string()))?;
    progress.warn(&format!(
        "Could not extract the package name from the archive: {}. \
         Based on the file name, assuming it is \"{}\"",
        e, name
    ));
    Ok(name)
}

/// Decompress and unpack the `.tgz` at `tarball` into `dest`, reading it from disk
fn unpack_tarball(tarball: &Path, dest: &Path) -> Result<(), ExtractError> {
    let file = File::open(tarball)
        .map_err(|e| ExtractError::Io(format!("{}: {}", tarball.display(), e)))?;
    std::fs::create_dir_all(dest)
        .map_err(|e| ExtractError::Io(format!("{}: {}", dest.display(), e)))?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive
        .unpack(dest)
        .map_err(|e| ExtractError::Archive(e.to_string()))
}

/// npm tarballs hold a single top-level directory, usually `package/`
fn find_package_root(dest: &Path) -> Result<PathBuf, ExtractError> {
    let conventional = dest.join("package");
    if conventional.join(MANIFEST_FILE).is_file() {
        return Ok(conventional);
    }

    let entries = std::fs::read_dir(dest).map_err(|e| ExtractError::Io(e.to_string()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && path.join(MANIFEST_FILE).is_file() {
            return Ok(path);
        }
    }

    if dest.join(MANIFEST_FILE).is_file() {
        return Ok(dest.to_path_buf());
    }

    Err(ExtractError::Archive(format!(
        "no {} found in archive",
        MANIFEST_FILE
    )))
}

/// `git+https://host/org/repo.git#ref` -> `repo`
fn name_from_git_url(raw: &str) -> String {
    let without_fragment = raw.split('#').next().unwrap_or(raw);
    let segment = without_fragment
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(without_fragment);
    segment.strip_suffix(".git").unwrap_or(segment).to_string()
}

/// Everything before the first `@` that is not a leading scope marker
fn strip_qualifier(raw: &str) -> &str {
    let Some(first) = raw.chars().next() else {
        return raw;
    };
    let offset = first.len_utf8();
    match raw[offset..].find('@') {
        Some(idx) => &raw[..offset + idx],
        None => raw,
    }
}

/// `dir/foo-1.2.3.tgz` -> `foo`
fn infer_from_tarball_name(raw: &str) -> Option<String> {
    let file = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let stem = file
        .strip_suffix(".tgz")
        .or_else(|| file.strip_suffix(".tar.gz"))
        .unwrap_or(file);

    let bytes = stem.as_bytes();
    let version_start = (1..bytes.len())
        .find(|&i| bytes[i - 1] == b'-' && bytes[i].is_ascii_digit())
        .map(|i| i - 1);
    let name = match version_start {
        Some(idx) => &stem[..idx],
        None => stem,
    };

    (!name.is_empty()).then(|| name.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid archive: {0}")]
    Archive(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Cannot infer a package name from {0}")]
    NotInferable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::resolve;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tar::Builder;
    use tempfile::TempDir;

    fn make_tgz(top_level: &str, manifest: &str) -> Vec<u8> {
        let mut tar_buf = Vec::new();
        {
            let gz = GzEncoder::new(&mut tar_buf, Compression::default());
            let mut tar = Builder::new(gz);

            let mut header = tar::Header::new_gnu();
            header.set_size(manifest.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(
                &mut header,
                format!("{}/package.json", top_level),
                manifest.as_bytes(),
            )
            .unwrap();
            tar.into_inner().unwrap().finish().unwrap();
        }
        tar_buf
    }

    #[tokio::test]
    async fn test_tarball_manifest_name() {
        let dir = TempDir::new().unwrap();
        let tgz = make_tgz("package", r#"{ "name": "bar", "version": "1.2.3" }"#);
        std::fs::write(dir.path().join("foo-1.2.3.tgz"), tgz).unwrap();

        let extractor = NameExtractor::new(dir.path());
        let reference = resolve("otter-scripts", Some("foo-1.2.3.tgz"), dir.path());
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "bar");
    }

    #[tokio::test]
    async fn test_tarball_with_nonstandard_top_level() {
        let dir = TempDir::new().unwrap();
        let tgz = make_tgz("node", r#"{ "name": "@acme/scripts" }"#);
        std::fs::write(dir.path().join("scripts-0.1.0.tar.gz"), tgz).unwrap();

        let extractor = NameExtractor::new(dir.path());
        let reference = PackageReference::TarballPath("./scripts-0.1.0.tar.gz".to_string());
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "@acme/scripts");
    }

    #[tokio::test]
    async fn test_corrupt_tarball_falls_back_to_file_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("foo-1.2.3.tgz"), b"definitely not gzip").unwrap();

        let extractor = NameExtractor::new(dir.path());
        let reference = PackageReference::TarballPath("foo-1.2.3.tgz".to_string());
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "foo");
    }

    #[tokio::test]
    async fn test_missing_tarball_falls_back_to_file_name() {
        let dir = TempDir::new().unwrap();
        let extractor = NameExtractor::new(dir.path());
        let reference = PackageReference::TarballPath("vendor/my-scripts-2.0.0.tgz".to_string());
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "my-scripts");
    }

    #[tokio::test]
    async fn test_tarball_without_manifest_falls_back() {
        let dir = TempDir::new().unwrap();
        let mut tar_buf = Vec::new();
        {
            let gz = GzEncoder::new(&mut tar_buf, Compression::default());
            let mut tar = Builder::new(gz);
            let mut header = tar::Header::new_gnu();
            header.set_size(2);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, "package/README.md", &b"hi"[..])
                .unwrap();
            tar.into_inner().unwrap().finish().unwrap();
        }
        std::fs::write(dir.path().join("foo-1.2.3.tgz"), tar_buf).unwrap();

        let extractor = NameExtractor::new(dir.path());
        let reference = PackageReference::TarballPath("foo-1.2.3.tgz".to_string());
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "foo");
    }

    #[tokio::test]
    async fn test_file_reference_to_tarball_reads_archive() {
        let dir = TempDir::new().unwrap();
        let tgz = make_tgz("package", r#"{ "name": "bar" }"#);
        std::fs::write(dir.path().join("foo-1.2.3.tgz"), tgz).unwrap();

        let reference = resolve("otter-scripts", Some("file:foo-1.2.3.tgz"), dir.path());
        assert_eq!(
            reference.as_install_arg(),
            format!("file:{}", dir.path().join("foo-1.2.3.tgz").display())
        );

        let extractor = NameExtractor::new(dir.path());
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "bar");
    }

    #[tokio::test]
    async fn test_file_reference_to_corrupt_tarball_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("foo-1.2.3.tgz"), b"not gzip").unwrap();

        let extractor = NameExtractor::new(dir.path());
        let reference = resolve("otter-scripts", Some("file:foo-1.2.3.tgz"), dir.path());
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "foo");
    }

    /// Answer every connection on a local port with `status` and `body`
    async fn serve(status: &'static str, body: Vec<u8>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_remote_tarball_is_downloaded_and_read() {
        let base = serve("200 OK", make_tgz("package", r#"{ "name": "bar" }"#)).await;
        let url = format!("{}/foo-1.2.3.tgz", base);

        let extractor = NameExtractor::new(Path::new("/"));
        let reference = resolve("otter-scripts", Some(url.as_str()), Path::new("/"));
        assert_eq!(reference, PackageReference::TarballUrl(url.clone()));
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "bar");
    }

    #[tokio::test]
    async fn test_remote_http_error_falls_back_to_file_name() {
        let base = serve("404 Not Found", Vec::new()).await;
        let url = format!("{}/my-scripts-2.0.0.tgz", base);
        let extractor = NameExtractor::new(Path::new("/"));

        let err = extractor
            .name_from_tarball(TarballSource::Remote(&url))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Http(404)));

        let name = extractor
            .extract(&PackageReference::TarballUrl(url), &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "my-scripts");
    }

    #[tokio::test]
    async fn test_unreachable_url_falls_back_to_file_name() {
        let extractor = NameExtractor::new(Path::new("/"));
        let reference =
            PackageReference::TarballUrl("http://127.0.0.1:1/foo-1.2.3.tgz".to_string());
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "foo");
    }

    #[tokio::test]
    async fn test_git_url() {
        let extractor = NameExtractor::new(Path::new("/"));
        let reference = resolve(
            "otter-scripts",
            Some("git+https://example.com/org/myrepo.git#v1.2.3"),
            Path::new("/"),
        );
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "myrepo");
    }

    #[tokio::test]
    async fn test_local_path_reads_manifest() {
        let dir = TempDir::new().unwrap();
        let pkg_dir = dir.path().join("scripts");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(pkg_dir.join("package.json"), r#"{ "name": "local-scripts" }"#).unwrap();

        let extractor = NameExtractor::new(dir.path());
        let reference = resolve("otter-scripts", Some("file:scripts"), dir.path());
        let name = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap();
        assert_eq!(name, "local-scripts");
    }

    #[tokio::test]
    async fn test_local_path_without_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        let extractor = NameExtractor::new(dir.path());
        let reference = resolve("otter-scripts", Some("file:missing"), dir.path());
        let err = extractor
            .extract(&reference, &mut Progress::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Manifest(ManifestError::Io { .. })));
    }

    #[tokio::test]
    async fn test_registry_references() {
        let extractor = NameExtractor::new(Path::new("/"));
        let cases = [
            (None, "otter-scripts"),
            (Some("1.2.3"), "otter-scripts"),
            (Some("@next"), "otter-scripts"),
            (Some("@acme/scripts@2.0.0"), "@acme/scripts"),
            (Some("@acme/scripts"), "@acme/scripts"),
            (Some("my-fork@1.0"), "my-fork"),
            (Some("my-fork"), "my-fork"),
        ];
        for (raw, expected) in cases {
            let reference = resolve("otter-scripts", raw, Path::new("/"));
            let name = extractor
                .extract(&reference, &mut Progress::silent())
                .await
                .unwrap();
            assert_eq!(name, expected, "reference {:?}", raw);
        }
    }

    #[test]
    fn test_name_from_git_url() {
        assert_eq!(name_from_git_url("git+ssh://git@host/org/repo.git"), "repo");
        assert_eq!(name_from_git_url("git+https://host/org/repo"), "repo");
        assert_eq!(name_from_git_url("git+https://host/org/repo.git#main"), "repo");
    }

    #[test]
    fn test_strip_qualifier() {
        assert_eq!(strip_qualifier("pkg@1.0.0"), "pkg");
        assert_eq!(strip_qualifier("@scope/pkg@next"), "@scope/pkg");
        assert_eq!(strip_qualifier("@scope/pkg"), "@scope/pkg");
        assert_eq!(strip_qualifier("pkg"), "pkg");
        assert_eq!(strip_qualifier(""), "");
    }

    #[test]
    fn test_infer_from_tarball_name() {
        assert_eq!(infer_from_tarball_name("foo-1.2.3.tgz").as_deref(), Some("foo"));
        assert_eq!(
            infer_from_tarball_name("https://cdn.example.com/dl/otter-scripts-0.9.0-rc.1.tgz")
                .as_deref(),
            Some("otter-scripts")
        );
        assert_eq!(infer_from_tarball_name("./dir/plain.tar.gz").as_deref(), Some("plain"));
        assert_eq!(infer_from_tarball_name("dir/.tgz"), None);
    }
}
