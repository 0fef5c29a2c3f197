use crate::core::models::Client;
use crate::core::types::{ClientId, ClientSecret, GrantType, RedirectUri, Scope, UnixTime};
use crate::util::hash::HashingService;

use clap::Parser;

#[derive(Parser)]
#[clap(
    name = "kouza-util",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS")
)]
pub struct Options {
    #[clap(env = "HASH_SECRET")]
    hash_secret: String,
    #[clap(subcommand)]
    command: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    HashSecret(HashSecret),
    NewClient(NewClient),
    ListClients(ListClients),
}

/// Print the keyed hash of a client secret, for editing a clients file by
/// hand.
#[derive(Parser)]
struct HashSecret {
    #[clap(short, long)]
    secret: String,
}

/// Print a complete client record as JSON, ready to paste into the clients
/// file.
#[derive(Parser)]
struct NewClient {
    #[clap(short, long)]
    id: String,
    #[clap(short, long)]
    secret: String,
    #[clap(short, long)]
    redirect_uri: String,
    /// Space-delimited scope string, e.g. "read:user:basicinfo write:projects:recent"
    #[clap(long)]
    scope: String,
    /// Allowed grant types, e.g. --grant authorization_code --grant refresh_token
    #[clap(long = "grant")]
    grants: Vec<String>,
    #[clap(long)]
    access_token_lifetime: Option<u64>,
    #[clap(long)]
    refresh_token_lifetime: Option<u64>,
}

/// Print the ids of every client in a clients file.
#[derive(Parser)]
struct ListClients {
    #[clap(short, long, env = "CLIENTS_FILE")]
    file: String,
}

fn get_hasher(secret: &str) -> HashingService {
    HashingService::with_secret_key(secret.to_string())
}

fn parse_grant(name: &str) -> GrantType {
    match name {
        "authorization_code" => GrantType::AuthorizationCode,
        "refresh_token" => GrantType::RefreshToken,
        other => panic!("Unknown grant type: {}", other),
    }
}

fn hash_secret(c: &HashSecret, opts: &Options) {
    let hasher = get_hasher(&opts.hash_secret);
    let hashed = hasher
        .hash(&ClientSecret(c.secret.to_string()))
        .expect("Failed to hash secret");

    println!("{}", hashed.0);
}

fn new_client(c: &NewClient, opts: &Options) {
    let hasher = get_hasher(&opts.hash_secret);
    let secret = hasher
        .hash(&ClientSecret(c.secret.to_string()))
        .expect("Failed to hash secret");

    let grants = if c.grants.is_empty() {
        vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
    } else {
        c.grants.iter().map(|g| parse_grant(g)).collect()
    };

    let client = Client {
        client_id: ClientId(c.id.to_string()),
        secret,
        grants,
        redirect_uri: RedirectUri(c.redirect_uri.to_string()),
        scope: Scope::from_delimited_parts(&c.scope),
        access_token_lifetime: c.access_token_lifetime,
        refresh_token_lifetime: c.refresh_token_lifetime,
        scopes_last_updated: UnixTime::now(),
        last_used: UnixTime::epoch(),
    };

    let json = serde_json::to_string_pretty(&client).expect("Failed to encode client");
    println!("{}", json);
}

fn list_clients(c: &ListClients, _opts: &Options) {
    let contents = std::fs::read_to_string(&c.file).expect("Failed to read clients file");
    let clients: Vec<Client> =
        serde_json::from_str(&contents).expect("Failed to parse clients file");

    for client in clients {
        println!("{} ({})", client.client_id.0, client.scope.as_joined());
    }
}

pub fn run_cli_action(opts: Options) {
    use SubCommand::*;

    match &opts.command {
        HashSecret(c) => hash_secret(c, &opts),
        NewClient(c) => new_client(c, &opts),
        ListClients(c) => list_clients(c, &opts),
    };
}
