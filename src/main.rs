fn main() -> anyhow::Result<()> {
    priorauth_lib::run()
}
