use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a query against the repository graph and print the JSON response
    Query {
        /// Query document, or `-` to read it from stdin
        query: String,

        /// Variable values as a JSON object
        #[arg(long)]
        variables: Option<String>,

        /// Operation to run when the document holds several
        #[arg(short, long)]
        operation: Option<String>,
    },

    /// Print the schema definition language text
    Schema,

    /// List repositories present under the repos dir
    List,
}
