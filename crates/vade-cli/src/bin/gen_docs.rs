//! Binary that emits command-line options markdown to stdout.
//!
//! Run `cargo run -p vade-cli --bin gen_docs > options.md` to refresh the options reference.

fn main() {
    print!("{}", vade_cli::render_options_markdown());
}
