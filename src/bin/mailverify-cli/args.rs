use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mailverify-cli", version, about = "Vérification de délivrabilité d'adresses e-mail")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,

    /// fichier de configuration TOML
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// snapshot JSON du skip list MX (chargé au début, réécrit à la fin)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// niveau de log par défaut si MAILVERIFY_LOG n'est pas défini
    #[arg(long, global = true, default_value = "warn")]
    pub log: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// vérifie une ou plusieurs adresses
    Verify {
        emails: Vec<String>,
        /// lit des adresses depuis stdin (une par ligne)
        #[arg(long)]
        stdin: bool,
        /// format: human|json|ndjson|csv
        #[arg(long, default_value = "human")]
        format: String,
        /// écrit le rapport dans un fichier au lieu de stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// étiquette de provenance stockée avec chaque résultat
        #[arg(long)]
        source: Option<String>,
    },
    /// exécute un job de vérification en masse depuis un fichier
    Bulk {
        /// liste simple (une adresse par ligne) ou CSV avec une colonne `email`
        source: PathBuf,
        #[arg(long, default_value = "cli")]
        owner: String,
        /// répertoire des artefacts (prend le pas sur la configuration)
        #[arg(long)]
        artifact_dir: Option<PathBuf>,
        /// nombre de workers (prend le pas sur la configuration)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// gère le skip list MX persisté dans --state
    Skiplist {
        #[command(subcommand)]
        action: SkipAction,
    },
    /// contrôles de réputation ponctuels
    Monitor {
        #[command(subcommand)]
        check: MonitorCheck,
    },
}

#[derive(Subcommand)]
pub enum SkipAction {
    List {
        #[arg(long)]
        json: bool,
    },
    Add {
        host: String,
        #[arg(long)]
        note: Option<String>,
    },
    Remove {
        host: String,
    },
    /// supprime les entrées automatiques expirées
    Purge,
}

#[derive(Subcommand)]
pub enum MonitorCheck {
    Dmarc {
        domain: String,
        #[arg(long)]
        json: bool,
    },
    Blocklist {
        /// adresse IP ou nom de domaine
        target: String,
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
