mod cli;
mod config;
mod context;
mod render;
mod util;

pub fn main() {
    cli::exec();
}
