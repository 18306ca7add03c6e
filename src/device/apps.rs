//! App name → Android package catalog used for launching and for naming the
//! foreground app.

const APP_PACKAGES: &[(&str, &str)] = &[
    // Social & messaging
    ("微信", "com.tencent.mm"),
    ("QQ", "com.tencent.mobileqq"),
    ("微博", "com.sina.weibo"),
    // Shopping
    ("淘宝", "com.taobao.taobao"),
    ("京东", "com.jingdong.app.mall"),
    ("拼多多", "com.xunmeng.pinduoduo"),
    // Lifestyle
    ("小红书", "com.xingin.xhs"),
    ("豆瓣", "com.douban.frodo"),
    ("知乎", "com.zhihu.android"),
    // Maps
    ("高德地图", "com.autonavi.minimap"),
    ("百度地图", "com.baidu.BaiduMap"),
    // Food & services
    ("美团", "com.sankuai.meituan"),
    ("大众点评", "com.dianping.v1"),
    ("饿了么", "me.ele"),
    // Travel
    ("携程", "ctrip.android.view"),
    ("铁路12306", "com.MobileTicket"),
    ("12306", "com.MobileTicket"),
    ("去哪儿", "com.Qunar"),
    ("滴滴出行", "com.sdu.didi.psnger"),
    // Video
    ("bilibili", "tv.danmaku.bili"),
    ("抖音", "com.ss.android.ugc.aweme"),
    ("快手", "com.smile.gifmaker"),
    ("腾讯视频", "com.tencent.qqlive"),
    ("爱奇艺", "com.qiyi.video"),
    // Music & audio
    ("网易云音乐", "com.netease.cloudmusic"),
    ("QQ音乐", "com.tencent.qqmusic"),
    ("喜马拉雅", "com.ximalaya.ting.android"),
    // Reading
    ("番茄小说", "com.dragon.read"),
    ("番茄免费小说", "com.dragon.read"),
    ("七猫免费小说", "com.kmxs.reader"),
    // Productivity & AI
    ("飞书", "com.ss.android.lark"),
    ("豆包", "com.larus.nova"),
    // News
    ("腾讯新闻", "com.tencent.news"),
    ("今日头条", "com.ss.android.article.news"),
    // System
    ("Settings", "com.android.settings"),
    ("Chrome", "com.android.chrome"),
];

/// Exact name first, then an ASCII case-insensitive match (`Bilibili`, `settings`).
pub fn package_for(name: &str) -> Option<&'static str> {
    let name = name.trim();
    APP_PACKAGES
        .iter()
        .find(|(n, _)| *n == name)
        .or_else(|| APP_PACKAGES.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
        .map(|(_, pkg)| *pkg)
}

/// First catalog name whose package appears in `text`.
pub fn app_in_text(text: &str) -> Option<&'static str> {
    APP_PACKAGES
        .iter()
        .find(|(_, pkg)| text.contains(pkg))
        .map(|(name, _)| *name)
}

pub fn supported_apps() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = APP_PACKAGES.iter().map(|(n, _)| *n).collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        assert_eq!(package_for("微信"), Some("com.tencent.mm"));
        assert_eq!(package_for(" settings "), Some("com.android.settings"));
        assert_eq!(package_for("NoSuchApp"), None);
    }

    #[test]
    fn shared_package_names_first_entry() {
        assert_eq!(app_in_text("mCurrentFocus=Window{1 u0 com.MobileTicket/.Main}"), Some("铁路12306"));
        assert_eq!(app_in_text("launcher"), None);
    }

    #[test]
    fn supported_list_is_sorted() {
        let apps = supported_apps();
        assert!(apps.windows(2).all(|w| w[0] <= w[1]));
        assert!(apps.contains(&"Chrome"));
    }
}
