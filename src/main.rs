use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use invoiceforge_auth::callback::CallbackRedirector;
use invoiceforge_auth::config::AuthConfig;
use invoiceforge_auth::guard;
use invoiceforge_auth::provider::{Navigator, OAuthProvider};
use invoiceforge_auth::supabase::SupabaseClient;
use invoiceforge_auth::{AuthError, AuthRuntime, WritePolicy};

#[derive(Parser, Debug)]
#[command(name = "invoiceforge-auth", about = "InvoiceForge session lifecycle driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the consent URL for an OAuth sign-in.
    Login {
        #[arg(long, default_value = "google")]
        provider: OAuthProvider,
    },
    /// Finish a sign-in from the redirect URL and print the landing route.
    Callback {
        url: String,
        /// Verifier printed by `login`, for code (PKCE) redirects.
        #[arg(long, env = "AUTH_CODE_VERIFIER")]
        code_verifier: Option<String>,
    },
    /// Run bootstrap + listener and log every session change until Ctrl-C.
    Watch {
        #[arg(long, env = "AUTH_REFRESH_TOKEN")]
        refresh_token: Option<String>,
        #[arg(long, value_enum, default_value_t = PolicyArg::ListenerWins)]
        policy: PolicyArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    ListenerWins,
    LastWriteWins,
}

impl From<PolicyArg> for WritePolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::ListenerWins => Self::ListenerWins,
            PolicyArg::LastWriteWins => Self::LastWriteWins,
        }
    }
}

/// Navigator for a terminal: prints the route it would replace history with.
struct StdoutNavigator;

impl Navigator for StdoutNavigator {
    fn replace(&self, route: &str) {
        println!("{route}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.error_code(), fatal = e.is_fatal(), "invoiceforge-auth failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AuthError> {
    let config = AuthConfig::from_env()?;
    let client = Arc::new(SupabaseClient::new(&config)?);
    tracing::info!(url = %config.supabase_url, "provider client initialized");

    match cli.command {
        Command::Login { provider } => {
            let url = guard::sign_in(client.as_ref(), provider, &config).await?;
            println!("{url}");
            if let Some(verifier) = url
                .query_pairs()
                .find(|(k, _)| k == "code_challenge")
                .map(|(_, v)| v.into_owned())
            {
                eprintln!("code verifier: {verifier}");
            }
        }
        Command::Callback { url, code_verifier } => {
            if let Some(verifier) = code_verifier {
                client.resume_pkce(verifier)?;
            }
            let mut redirector = CallbackRedirector::new(client.clone(), Arc::new(StdoutNavigator), config.landing_route.clone());
            let outcome = redirector.handle(&url).await;
            tracing::info!(signed_in = outcome.signed_in, "callback handled");
        }
        Command::Watch { refresh_token, policy } => watch(client, refresh_token, policy.into()).await?,
    }
    Ok(())
}

async fn watch(client: Arc<SupabaseClient>, refresh_token: Option<String>, policy: WritePolicy) -> Result<(), AuthError> {
    let runtime = AuthRuntime::start(client.clone(), client.clone(), policy).await;
    let mut rx = runtime.subscribe();

    if let Some(token) = refresh_token {
        if let Err(e) = client.sign_in_with_refresh_token(&token).await {
            runtime.shutdown().await;
            return Err(e);
        }
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                tracing::info!(
                    loading = state.loading,
                    user_id = ?state.identity.as_ref().map(|i| i.id),
                    email = ?state.identity.as_ref().and_then(|i| i.email.clone()),
                    redirect = ?guard::unauth_redirect(&state),
                    "session state"
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    runtime.shutdown().await;
    Ok(())
}
