use super::Context;
use anyhow::Result;
use dialoguer::{Input, Password};
use tossup_core::User;

pub async fn login(ctx: &Context, phone: Option<String>, password: Option<String>) -> Result<()> {
    let phone = match phone {
        Some(phone) => phone,
        None => Input::<String>::new().with_prompt("Phone number").interact_text()?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::new().with_prompt("Password").interact()?,
    };

    println!("Logging in as {}...", phone);
    let user = ctx.session.login(&ctx.api, phone.trim(), &password).await?;

    println!("Logged in successfully!");
    print_user(&user);
    Ok(())
}

pub async fn logout(ctx: &Context) -> Result<()> {
    if !ctx.session.is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }

    ctx.session.logout().await?;
    println!("Logged out.");
    Ok(())
}

pub async fn whoami(ctx: &Context, refresh: bool) -> Result<()> {
    let user = if refresh {
        ctx.session.refresh_user(&ctx.api).await?
    } else {
        ctx.session.require()?.user
    };

    print_user(&user);
    Ok(())
}

fn print_user(user: &User) {
    println!("User Information:");
    if let Some(name) = &user.name {
        println!("  Name: {}", name);
    }
    println!("  Phone: {}", user.phone);
    println!("  ID: {}", user.id);
    println!("  Points: {}", user.points);
}
