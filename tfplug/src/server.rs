//! Server module for running Terraform providers
//!
//! Starts the gRPC server on a loopback port and performs the go-plugin
//! handshake Terraform expects on stdout. Logging must therefore never go to
//! stdout once `serve` is running.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcService;
use crate::provider::Provider;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use std::io::Write;
use std::path::PathBuf;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const CORE_PROTOCOL_VERSION: u32 = 1;
const PLUGIN_PROTOCOL_VERSION: u32 = 6;

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PEM certificate used when Terraform does not negotiate AutoMTLS
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Maximum gRPC message size in bytes
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            max_message_size: 256 << 20,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cert_path(mut self, path: PathBuf) -> Self {
        self.cert_path = Some(path);
        self
    }

    pub fn with_key_path(mut self, path: PathBuf) -> Self {
        self.key_path = Some(path);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

/// How the transport is secured, decided once at startup
enum Transport {
    /// Terraform sent its client certificate; the server certificate is
    /// generated and advertised in the handshake
    AutoMtls {
        tls: ServerTlsConfig,
        server_cert_der: Vec<u8>,
    },
    Tls(ServerTlsConfig),
    Plaintext,
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    check_magic_cookie()?;

    // tonic's rustls needs a process-wide provider; a second install is harmless
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let transport = select_transport(&config).await?;

    let service = GrpcService::new(provider)
        .into_server()
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let mut builder = Server::builder();
    let handshake = match transport {
        Transport::AutoMtls {
            tls,
            server_cert_der,
        } => {
            builder = builder.tls_config(tls)?;
            handshake_line(&addr.to_string(), Some(&server_cert_der))
        }
        Transport::Tls(tls) => {
            builder = builder.tls_config(tls)?;
            handshake_line(&addr.to_string(), None)
        }
        Transport::Plaintext => handshake_line(&addr.to_string(), None),
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", handshake)?;
    stdout.flush()?;
    drop(stdout);

    tracing::info!(address = %addr, "provider server listening");

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    builder
        .add_service(service)
        .serve_with_incoming_shutdown(incoming, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("provider server stopped");
    Ok(())
}

/// Convenience function to run a provider with default configuration
pub async fn serve_default<P: Provider + 'static>(provider: P) -> Result<()> {
    serve(provider, ServerConfig::default()).await
}

fn check_magic_cookie() -> Result<()> {
    match std::env::var(MAGIC_COOKIE_KEY) {
        Ok(value) if value == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(TfplugError::HandshakeError(
            "This binary is a plugin. These are not meant to be executed directly. \
             Please execute the program that consumes these plugins, which will \
             load any plugins automatically"
                .to_string(),
        )),
    }
}

async fn select_transport(config: &ServerConfig) -> Result<Transport> {
    if let Ok(client_cert) = std::env::var("PLUGIN_CLIENT_CERT") {
        if !client_cert.trim().is_empty() {
            let generated = generate_server_certificate()?;
            let tls = ServerTlsConfig::new()
                .identity(Identity::from_pem(&generated.cert_pem, &generated.key_pem))
                .client_ca_root(Certificate::from_pem(client_cert));
            tracing::debug!("using AutoMTLS");
            return Ok(Transport::AutoMtls {
                tls,
                server_cert_der: generated.cert_der,
            });
        }
    }

    match (&config.cert_path, &config.key_path) {
        (Some(cert_path), Some(key_path)) => {
            let cert = tokio::fs::read(cert_path)
                .await
                .map_err(|e| TfplugError::TlsError(format!("Failed to read certificate: {}", e)))?;
            let key = tokio::fs::read(key_path)
                .await
                .map_err(|e| TfplugError::TlsError(format!("Failed to read key: {}", e)))?;
            Ok(Transport::Tls(
                ServerTlsConfig::new().identity(Identity::from_pem(cert, key)),
            ))
        }
        (None, None) => Ok(Transport::Plaintext),
        _ => Err(TfplugError::TlsError(
            "cert_path and key_path must be set together".to_string(),
        )),
    }
}

struct GeneratedCertificate {
    cert_pem: String,
    key_pem: String,
    cert_der: Vec<u8>,
}

/// Self-signed certificate for AutoMTLS. Terraform pins it from the
/// handshake, so it acts as its own CA.
fn generate_server_certificate() -> Result<GeneratedCertificate> {
    use rcgen::{
        BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
        KeyUsagePurpose,
    };

    let tls_err = |e: rcgen::Error| TfplugError::TlsError(format!("certificate generation: {}", e));

    let mut params = CertificateParams::new(vec!["localhost".to_string()]).map_err(tls_err)?;
    params
        .distinguished_name
        .push(DnType::OrganizationName, "HashiCorp");
    params.distinguished_name.push(DnType::CommonName, "localhost");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    let key_pair = KeyPair::generate().map_err(tls_err)?;
    let cert = params.self_signed(&key_pair).map_err(tls_err)?;

    Ok(GeneratedCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        cert_der: cert.der().to_vec(),
    })
}

/// `CORE|PLUGIN|tcp|ADDR|grpc[|CERT]`, the line go-plugin reads from stdout
fn handshake_line(addr: &str, server_cert_der: Option<&[u8]>) -> String {
    let mut line = format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PLUGIN_PROTOCOL_VERSION, addr
    );
    if let Some(der) = server_cert_der {
        line.push('|');
        line.push_str(&STANDARD_NO_PAD.encode(der));
    }
    line
}
